//! Masked views: one component field restricted to the rows one entity kind
//! refers to.
//!
//! The row set is resolved once, when the view is built, by mapping the
//! kind's reference column through the component store's reverse index. Views
//! borrow the store, so the row set cannot go stale while the view exists.
//! Reads copy out in kind order; writes scatter back into the shared column.
//!
//! A view has one slot per entity row, so two views over the same kind line
//! up lane for lane. Slots whose reference is unset or dead read as zero and
//! are skipped on write.

use std::fmt;

use crate::{
    component::ComponentStore,
    error::{StoreError, StoreResult},
    id::Id,
    value::Scalar,
};

/// Rows of a component store selected by one entity kind, one slot per
/// entity row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Selection {
    /// Live component ids; `None` where the reference is unset or dead.
    ids: Vec<Option<Id>>,
    /// Current component rows, parallel to `ids`.
    rows: Vec<Option<usize>>,
}

impl Selection {
    fn resolve(store: &ComponentStore, references: impl Iterator<Item = Option<Id>>) -> Self {
        let mut selection = Self::default();
        for reference in references {
            let row = reference.and_then(|id| store.row_of(id));
            selection.ids.push(reference.filter(|_| row.is_some()));
            selection.rows.push(row);
        }
        selection
    }

    fn gather<T: Scalar>(&self, column: &[T], width: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(self.rows.len() * width);
        for row in &self.rows {
            match *row {
                Some(row) => out.extend_from_slice(&column[row * width..(row + 1) * width]),
                None => out.resize(out.len() + width, T::default()),
            }
        }
        out
    }
}

/// How a right-hand side of `len` scalars lines up with `rows * width` lanes.
#[derive(Clone, Copy)]
enum Broadcast {
    /// One scalar per lane.
    Lanes,
    /// One row, repeated for every selected row.
    Row(usize),
    /// One scalar for everything.
    Scalar,
}

impl Broadcast {
    fn of(field: &str, len: usize, rows: usize, width: usize) -> StoreResult<Self> {
        if len == rows * width {
            Ok(Self::Lanes)
        } else if len == width {
            Ok(Self::Row(width))
        } else if len == 1 {
            Ok(Self::Scalar)
        } else {
            Err(StoreError::WidthMismatch {
                field: field.to_owned(),
                expected: rows * width,
                found: len,
            })
        }
    }

    const fn index(self, lane: usize) -> usize {
        match self {
            Self::Lanes => lane,
            Self::Row(width) => lane % width,
            Self::Scalar => 0,
        }
    }
}

/// Read-only masked view.
pub struct MaskedView<'w> {
    store: &'w ComponentStore,
    field: String,
    width: usize,
    selection: Selection,
}

impl<'w> MaskedView<'w> {
    pub(crate) fn new(
        store: &'w ComponentStore,
        field: &str,
        references: impl Iterator<Item = Option<Id>>,
    ) -> StoreResult<Self> {
        let width = field_width(store, field)?;
        Ok(Self {
            store,
            field: field.to_owned(),
            width,
            selection: Selection::resolve(store, references),
        })
    }

    /// Number of slots, one per entity row of the kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selection.rows.len()
    }

    /// Check if the kind has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selection.rows.is_empty()
    }

    /// Component id in each slot.
    #[must_use]
    pub fn ids(&self) -> &[Option<Id>] {
        &self.selection.ids
    }

    /// Component row in each slot.
    #[must_use]
    pub fn rows(&self) -> &[Option<usize>] {
        &self.selection.rows
    }

    /// Copy the lanes out, flattened to `len * width` scalars. Empty slots
    /// read as zero.
    pub fn gather<T: Scalar>(&self) -> StoreResult<Vec<T>> {
        let (column, width) = self.store.flat::<T>(&self.field)?;
        Ok(self.selection.gather(column, width))
    }

    /// Copy the selected rows out as `[T; N]`.
    pub fn gather_rows<T: Scalar, const N: usize>(&self) -> StoreResult<Vec<[T; N]>> {
        let rows = self.store.column_rows::<T, N>(&self.field)?;
        Ok(self
            .selection
            .rows
            .iter()
            .map(|row| row.map_or([T::default(); N], |row| rows[row]))
            .collect())
    }
}

impl fmt::Debug for MaskedView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskedView")
            .field("component", &self.store.name())
            .field("field", &self.field)
            .field("width", &self.width)
            .field("rows", &self.selection.rows)
            .finish()
    }
}

/// Masked view that writes back into the shared column.
///
/// Every write computes the complete new lane set from the current column
/// before storing any of it.
pub struct MaskedViewMut<'w> {
    store: &'w mut ComponentStore,
    field: String,
    width: usize,
    selection: Selection,
}

impl<'w> MaskedViewMut<'w> {
    pub(crate) fn new(
        store: &'w mut ComponentStore,
        field: &str,
        references: impl Iterator<Item = Option<Id>>,
    ) -> StoreResult<Self> {
        let width = field_width(store, field)?;
        let selection = Selection::resolve(store, references);
        Ok(Self {
            store,
            field: field.to_owned(),
            width,
            selection,
        })
    }

    /// Number of slots, one per entity row of the kind.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selection.rows.len()
    }

    /// Check if the kind has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selection.rows.is_empty()
    }

    /// Component id in each slot.
    #[must_use]
    pub fn ids(&self) -> &[Option<Id>] {
        &self.selection.ids
    }

    /// Copy the lanes out. Empty slots read as zero.
    pub fn gather<T: Scalar>(&self) -> StoreResult<Vec<T>> {
        let (column, width) = self.store.flat::<T>(&self.field)?;
        Ok(self.selection.gather(column, width))
    }

    /// Write `values` into the selected rows.
    ///
    /// `values` is either one scalar per lane of every slot, one row repeated
    /// for every slot, or a single scalar. Values aimed at empty slots are
    /// dropped. If two references select the same row, the later one wins.
    pub fn scatter<T: Scalar>(&mut self, values: &[T]) -> StoreResult<()> {
        let rows = self.selection.rows.len();
        let broadcast = Broadcast::of(&self.field, values.len(), rows, self.width)?;
        let (column, width) = self.store.flat_mut::<T>(&self.field)?;

        for (i, row) in self.selection.rows.iter().enumerate() {
            let Some(row) = *row else {
                continue;
            };
            for lane in 0..width {
                column[row * width + lane] = values[broadcast.index(i * width + lane)];
            }
        }
        Ok(())
    }

    /// `view += delta`.
    ///
    /// Arithmetic is lane-wise through [`Scalar`]: integers wrap and integer
    /// division by zero stores zero.
    pub fn add_assign<T: Scalar>(&mut self, delta: &[T]) -> StoreResult<()> {
        self.combine(delta, T::lane_add)
    }

    /// `view -= delta`.
    pub fn sub_assign<T: Scalar>(&mut self, delta: &[T]) -> StoreResult<()> {
        self.combine(delta, T::lane_sub)
    }

    /// `view *= factor`.
    pub fn mul_assign<T: Scalar>(&mut self, factor: &[T]) -> StoreResult<()> {
        self.combine(factor, T::lane_mul)
    }

    /// `view /= divisor`.
    pub fn div_assign<T: Scalar>(&mut self, divisor: &[T]) -> StoreResult<()> {
        self.combine(divisor, T::lane_div)
    }

    /// `view //= divisor`, rounding toward negative infinity.
    pub fn floor_div_assign<T: Scalar>(&mut self, divisor: &[T]) -> StoreResult<()> {
        self.combine(divisor, T::lane_floor_div)
    }

    /// Run `f` over a copy of the selected lanes, then write the copy back.
    pub fn update<T: Scalar>(&mut self, f: impl FnOnce(&mut [T])) -> StoreResult<()> {
        let mut lanes = self.gather::<T>()?;
        f(&mut lanes);
        self.scatter(&lanes)
    }

    fn combine<T: Scalar>(&mut self, rhs: &[T], op: impl Fn(T, T) -> T) -> StoreResult<()> {
        let rows = self.selection.rows.len();
        let broadcast = Broadcast::of(&self.field, rhs.len(), rows, self.width)?;

        let mut lanes = self.gather::<T>()?;
        for (i, lane) in lanes.iter_mut().enumerate() {
            *lane = op(*lane, rhs[broadcast.index(i)]);
        }
        self.scatter(&lanes)
    }
}

impl fmt::Debug for MaskedViewMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskedViewMut")
            .field("component", &self.store.name())
            .field("field", &self.field)
            .field("width", &self.width)
            .field("rows", &self.selection.rows)
            .finish()
    }
}

fn field_width(store: &ComponentStore, field: &str) -> StoreResult<usize> {
    store
        .schema()
        .field(field)
        .map(|def| def.ty.width())
        .ok_or_else(|| StoreError::UnknownField {
            ty: store.name().to_owned(),
            field: field.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ResizePolicy,
        schema::{FieldType, Schema},
        value::Value,
    };

    fn store() -> ComponentStore {
        let schema = Schema::builder("Physical")
            .field("pos", FieldType::vec2())
            .field("mass", FieldType::of::<f32>())
            .build()
            .unwrap();
        ComponentStore::new(schema, ResizePolicy::component())
    }

    fn refs(ids: &[Id]) -> impl Iterator<Item = Option<Id>> + '_ {
        ids.iter().copied().map(Some)
    }

    #[test]
    fn test_empty_slots_keep_alignment() {
        let mut store = store();
        let a = store.create(&[Value::from([1.0f32, 1.0])]).unwrap();
        let b = store.create(&[Value::from([2.0f32, 2.0])]).unwrap();
        let c = store.create(&[Value::from([3.0f32, 3.0])]).unwrap();
        store.destroy(b);

        let references = [Some(c), None, Some(b), Some(a)];
        let view = MaskedView::new(&store, "pos", references.into_iter()).unwrap();

        assert_eq!(view.len(), 4);
        assert_eq!(view.ids(), &[Some(c), None, None, Some(a)]);
        assert_eq!(
            view.gather::<f32>().unwrap(),
            vec![3.0, 3.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]
        );
        assert_eq!(
            view.gather_rows::<f32, 2>().unwrap(),
            vec![[3.0, 3.0], [0.0, 0.0], [0.0, 0.0], [1.0, 1.0]]
        );
    }

    #[test]
    fn test_scatter_skips_empty_slots() {
        let mut store = store();
        let a = store.create(&[Value::from([1.0f32, 1.0])]).unwrap();
        let b = store.create(&[Value::from([2.0f32, 2.0])]).unwrap();

        let references = [Some(a), None, Some(b)];
        let mut view = MaskedViewMut::new(&mut store, "pos", references.into_iter()).unwrap();
        view.scatter(&[10.0f32, 11.0, 20.0, 21.0, 30.0, 31.0]).unwrap();
        view.add_assign(&[1.0f32, 1.0, 5.0, 5.0, 2.0, 2.0]).unwrap();

        assert_eq!(store.column::<f32>("pos").unwrap(), &[11.0, 12.0, 32.0, 33.0]);
    }

    #[test]
    fn test_partial_rhs_lines_up_by_slot() {
        let mut store = store();
        let a = store.create(&[Value::from([1.0f32, 1.0])]).unwrap();
        let b = store.create(&[Value::from([2.0f32, 2.0])]).unwrap();

        // Gathered from an aligned view: the unset slot contributes zeros.
        let delta = MaskedView::new(&store, "pos", [None, Some(b)].into_iter())
            .unwrap()
            .gather::<f32>()
            .unwrap();
        assert_eq!(delta, vec![0.0, 0.0, 2.0, 2.0]);

        let mut pos = MaskedViewMut::new(&mut store, "pos", refs(&[a, b])).unwrap();
        pos.add_assign(&delta).unwrap();
        assert_eq!(store.column::<f32>("pos").unwrap(), &[1.0, 1.0, 4.0, 4.0]);
    }

    #[test]
    fn test_unknown_field() {
        let store = store();
        let err = MaskedView::new(&store, "vel", std::iter::empty()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { .. }));
    }

    #[test]
    fn test_scatter_only_touches_selection() {
        let mut store = store();
        let ids: Vec<_> = (0..4)
            .map(|i| store.create(&[Value::from(i as f32)]).unwrap())
            .collect();
        let picked = [ids[3], ids[1]];

        let mut view = MaskedViewMut::new(&mut store, "pos", refs(&picked)).unwrap();
        view.scatter(&[10.0f32, 11.0, 30.0, 31.0]).unwrap();

        let get = |id: Id| store.get(id).unwrap().get::<f32>("pos").unwrap().to_vec();
        assert_eq!(get(ids[0]), vec![0.0, 0.0]);
        assert_eq!(get(ids[1]), vec![30.0, 31.0]);
        assert_eq!(get(ids[2]), vec![2.0, 2.0]);
        assert_eq!(get(ids[3]), vec![10.0, 11.0]);
    }

    #[test]
    fn test_arithmetic_broadcasts() {
        let mut store = store();
        let a = store.create(&[Value::from([1.0f32, 2.0]), 4.0f32.into()]).unwrap();
        let b = store.create(&[Value::from([3.0f32, 4.0]), 8.0f32.into()]).unwrap();

        {
            let mut pos = MaskedViewMut::new(&mut store, "pos", refs(&[a, b])).unwrap();
            pos.add_assign(&[10.0f32]).unwrap();
            pos.mul_assign(&[1.0f32, -1.0]).unwrap();
            pos.sub_assign(&[1.0f32, 1.0, 2.0, 2.0]).unwrap();
        }
        {
            let mut mass = MaskedViewMut::new(&mut store, "mass", refs(&[b])).unwrap();
            mass.div_assign(&[2.0f32]).unwrap();
            assert!(mass.add_assign(&[1.0f32, 2.0, 3.0]).is_err());
        }

        assert_eq!(store.column::<f32>("pos").unwrap(), &[10.0, -13.0, 11.0, -16.0]);
        assert_eq!(store.column::<f32>("mass").unwrap(), &[4.0, 4.0]);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        let schema = Schema::builder("Counter")
            .field("n", FieldType::of::<u8>())
            .field("s", FieldType::of::<i32>())
            .build()
            .unwrap();
        let mut store = ComponentStore::new(schema, ResizePolicy::component());
        let a = store.create(&[250u8.into(), (-7i32).into()]).unwrap();
        let b = store.create(&[9u8.into(), 7i32.into()]).unwrap();

        {
            let mut n = MaskedViewMut::new(&mut store, "n", refs(&[a, b])).unwrap();
            n.add_assign(&[10u8]).unwrap();
            assert_eq!(n.gather::<u8>().unwrap(), vec![4, 19]);
            n.div_assign(&[0u8, 2]).unwrap();
            assert_eq!(n.gather::<u8>().unwrap(), vec![0, 9]);
        }
        {
            let mut s = MaskedViewMut::new(&mut store, "s", refs(&[a, b])).unwrap();
            s.floor_div_assign(&[2i32]).unwrap();
            assert_eq!(s.gather::<i32>().unwrap(), vec![-4, 3]);
            s.floor_div_assign(&[0i32]).unwrap();
            assert_eq!(s.gather::<i32>().unwrap(), vec![0, 0]);
        }
    }

    #[test]
    fn test_update_and_kind_mismatch() {
        let mut store = store();
        let a = store.create(&[Value::from([1.0f32, 2.0])]).unwrap();

        let mut view = MaskedViewMut::new(&mut store, "pos", refs(&[a])).unwrap();
        view.update::<f32>(|lanes| lanes.reverse()).unwrap();
        assert!(view.scatter(&[1.0f64]).is_err());
        assert_eq!(view.gather::<f32>().unwrap(), vec![2.0, 1.0]);
    }

    #[test]
    fn test_empty_selection() {
        let mut store = store();
        store.create_default();

        let mut view = MaskedViewMut::new(&mut store, "pos", std::iter::empty()).unwrap();
        assert!(view.is_empty());
        view.add_assign(&[5.0f32]).unwrap();
        assert_eq!(store.column::<f32>("pos").unwrap(), &[0.0, 0.0]);
    }
}
