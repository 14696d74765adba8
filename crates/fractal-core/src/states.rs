//! Batched attribute containers indexed by walker.
//!
//! Every container stores one row per walker. [`States`] is the dynamic
//! variant used for environment and model data whose schema is only known at
//! runtime; [`WalkersStates`](crate::walkers::WalkersStates) is the typed
//! counterpart for the walkers' own bookkeeping. Both implement
//! [`BatchState`], the capability set the selection algorithm relies on.

use serde::{Deserialize, Serialize};

use crate::error::{FractalError, Result};

/// Element type stored by a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F64,
    I64,
    U64,
    Bool,
}

/// Trailing shape and dtype of a single attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Shape of one walker's row, excluding the batch dimension.
    pub shape: Vec<usize>,
    pub dtype: DType,
}

impl FieldSpec {
    /// One value per walker.
    #[must_use]
    pub fn scalar(dtype: DType) -> Self {
        Self {
            shape: Vec::new(),
            dtype,
        }
    }

    /// A flat vector of `len` values per walker.
    #[must_use]
    pub fn vector(len: usize, dtype: DType) -> Self {
        Self {
            shape: vec![len],
            dtype,
        }
    }

    /// Number of scalar elements in one walker's row.
    #[must_use]
    pub fn row_len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Ordered mapping from attribute name to [`FieldSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Re-declaring a name replaces its spec in place.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.insert(name, spec);
        self
    }

    /// Insert or replace an attribute, keeping the original declaration order.
    pub fn insert(&mut self, name: impl Into<String>, spec: FieldSpec) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = spec,
            None => self.fields.push((name, spec)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, spec)| spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> + Clone + '_ {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Flat row-major storage backing a [`Column`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    F64(Vec<f64>),
    I64(Vec<i64>),
    U64(Vec<u64>),
    Bool(Vec<bool>),
}

macro_rules! with_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ColumnData::F64($values) => $body,
            ColumnData::I64($values) => $body,
            ColumnData::U64($values) => $body,
            ColumnData::Bool($values) => $body,
        }
    };
}

macro_rules! map_values {
    ($data:expr, $values:ident => $body:expr) => {
        match $data {
            ColumnData::F64($values) => ColumnData::F64($body),
            ColumnData::I64($values) => ColumnData::I64($body),
            ColumnData::U64($values) => ColumnData::U64($body),
            ColumnData::Bool($values) => ColumnData::Bool($body),
        }
    };
}

impl ColumnData {
    fn dtype(&self) -> DType {
        match self {
            Self::F64(_) => DType::F64,
            Self::I64(_) => DType::I64,
            Self::U64(_) => DType::U64,
            Self::Bool(_) => DType::Bool,
        }
    }

    fn len(&self) -> usize {
        with_values!(self, values => values.len())
    }

    fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F64 => Self::F64(vec![0.0; len]),
            DType::I64 => Self::I64(vec![0; len]),
            DType::U64 => Self::U64(vec![0; len]),
            DType::Bool => Self::Bool(vec![false; len]),
        }
    }

    fn extend_from(&mut self, other: &Self) -> Result<()> {
        match (self, other) {
            (Self::F64(dst), Self::F64(src)) => dst.extend_from_slice(src),
            (Self::I64(dst), Self::I64(src)) => dst.extend_from_slice(src),
            (Self::U64(dst), Self::U64(src)) => dst.extend_from_slice(src),
            (Self::Bool(dst), Self::Bool(src)) => dst.extend_from_slice(src),
            (dst, src) => {
                return Err(FractalError::shape(format!(
                    "cannot join {:?} values with {:?} values",
                    dst.dtype(),
                    src.dtype()
                )));
            }
        }
        Ok(())
    }

    fn copy_row(&mut self, row_len: usize, to: usize, source: &Self, from: usize) {
        let dst = to * row_len..(to + 1) * row_len;
        let src = from * row_len..(from + 1) * row_len;
        match (self, source) {
            (Self::F64(d), Self::F64(s)) => d[dst].copy_from_slice(&s[src]),
            (Self::I64(d), Self::I64(s)) => d[dst].copy_from_slice(&s[src]),
            (Self::U64(d), Self::U64(s)) => d[dst].copy_from_slice(&s[src]),
            (Self::Bool(d), Self::Bool(s)) => d[dst].copy_from_slice(&s[src]),
            _ => debug_assert!(false, "copy_row called with mismatched dtypes"),
        }
    }
}

/// One attribute of a batched container: `batch_size` rows of a fixed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    batch_size: usize,
    shape: Vec<usize>,
    data: ColumnData,
}

impl Column {
    /// Allocate zero-initialised storage for `batch_size` walkers.
    #[must_use]
    pub fn zeros(batch_size: usize, spec: &FieldSpec) -> Self {
        Self {
            batch_size,
            shape: spec.shape.clone(),
            data: ColumnData::zeros(spec.dtype, batch_size * spec.row_len()),
        }
    }

    /// Wrap existing storage, checking that it holds whole rows.
    pub fn new(batch_size: usize, shape: Vec<usize>, data: ColumnData) -> Result<Self> {
        let row_len: usize = shape.iter().product();
        if data.len() != batch_size * row_len {
            return Err(FractalError::shape(format!(
                "{} values cannot fill {batch_size} rows of shape {shape:?}",
                data.len()
            )));
        }
        Ok(Self {
            batch_size,
            shape,
            data,
        })
    }

    /// Rows of `f64` values with the given trailing shape; the batch size is inferred.
    pub fn from_f64(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        Self::inferred(shape, ColumnData::F64(values))
    }

    pub fn from_i64(shape: Vec<usize>, values: Vec<i64>) -> Result<Self> {
        Self::inferred(shape, ColumnData::I64(values))
    }

    pub fn from_u64(shape: Vec<usize>, values: Vec<u64>) -> Result<Self> {
        Self::inferred(shape, ColumnData::U64(values))
    }

    pub fn from_bool(shape: Vec<usize>, values: Vec<bool>) -> Result<Self> {
        Self::inferred(shape, ColumnData::Bool(values))
    }

    /// One `f64` per walker.
    #[must_use]
    pub fn scalar_f64(values: Vec<f64>) -> Self {
        Self {
            batch_size: values.len(),
            shape: Vec::new(),
            data: ColumnData::F64(values),
        }
    }

    /// One flag per walker.
    #[must_use]
    pub fn scalar_bool(values: Vec<bool>) -> Self {
        Self {
            batch_size: values.len(),
            shape: Vec::new(),
            data: ColumnData::Bool(values),
        }
    }

    fn inferred(shape: Vec<usize>, data: ColumnData) -> Result<Self> {
        let row_len: usize = shape.iter().product();
        if row_len == 0 {
            return Err(FractalError::shape(format!(
                "cannot infer the batch size of a column with empty rows (shape {shape:?})"
            )));
        }
        if data.len() % row_len != 0 {
            return Err(FractalError::shape(format!(
                "{} values do not split into rows of shape {shape:?}",
                data.len()
            )));
        }
        Ok(Self {
            batch_size: data.len() / row_len,
            shape,
            data,
        })
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Trailing shape (excluding the batch dimension).
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[must_use]
    pub fn row_len(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn spec(&self) -> FieldSpec {
        FieldSpec {
            shape: self.shape.clone(),
            dtype: self.dtype(),
        }
    }

    #[must_use]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn as_f64(&self) -> Result<&[f64]> {
        match &self.data {
            ColumnData::F64(values) => Ok(values),
            other => Err(dtype_error(DType::F64, other.dtype())),
        }
    }

    pub fn as_f64_mut(&mut self) -> Result<&mut [f64]> {
        match &mut self.data {
            ColumnData::F64(values) => Ok(values),
            other => Err(dtype_error(DType::F64, other.dtype())),
        }
    }

    pub fn as_i64(&self) -> Result<&[i64]> {
        match &self.data {
            ColumnData::I64(values) => Ok(values),
            other => Err(dtype_error(DType::I64, other.dtype())),
        }
    }

    pub fn as_u64(&self) -> Result<&[u64]> {
        match &self.data {
            ColumnData::U64(values) => Ok(values),
            other => Err(dtype_error(DType::U64, other.dtype())),
        }
    }

    pub fn as_bool(&self) -> Result<&[bool]> {
        match &self.data {
            ColumnData::Bool(values) => Ok(values),
            other => Err(dtype_error(DType::Bool, other.dtype())),
        }
    }

    pub fn as_bool_mut(&mut self) -> Result<&mut [bool]> {
        match &mut self.data {
            ColumnData::Bool(values) => Ok(values),
            other => Err(dtype_error(DType::Bool, other.dtype())),
        }
    }

    /// `f64` row belonging to walker `index`.
    pub fn row_f64(&self, index: usize) -> Result<&[f64]> {
        check_index(index, self.batch_size)?;
        let row_len = self.row_len();
        let values = self.as_f64()?;
        Ok(&values[index * row_len..(index + 1) * row_len])
    }

    /// Batch-size-1 copy of walker `index`.
    pub fn row(&self, index: usize) -> Result<Self> {
        check_index(index, self.batch_size)?;
        let row_len = self.row_len();
        let span = index * row_len..(index + 1) * row_len;
        Ok(Self {
            batch_size: 1,
            shape: self.shape.clone(),
            data: map_values!(&self.data, values => values[span.clone()].to_vec()),
        })
    }

    /// Stack columns along the batch dimension, preserving their order.
    pub fn concat(parts: &[&Self]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(FractalError::InvalidConfig(
                "cannot concatenate an empty sequence of columns",
            ));
        };
        let mut joined = (*first).clone();
        for part in &parts[1..] {
            if part.shape != joined.shape {
                return Err(FractalError::shape(format!(
                    "cannot join rows of shape {:?} with rows of shape {:?}",
                    part.shape, joined.shape
                )));
            }
            joined.data.extend_from(&part.data)?;
            joined.batch_size += part.batch_size;
        }
        Ok(joined)
    }

    fn same_layout(&self, other: &Self) -> bool {
        self.batch_size == other.batch_size
            && self.shape == other.shape
            && self.dtype() == other.dtype()
    }

    /// Overwrite cloned rows from a snapshot taken before any row is touched.
    fn clone_rows(&mut self, will_clone: &[bool], compas: &[usize]) {
        let row_len = self.row_len();
        if row_len == 0 {
            return;
        }
        let snapshot = self.data.clone();
        for (index, (&clone, &companion)) in will_clone.iter().zip(compas).enumerate() {
            if clone {
                self.data.copy_row(row_len, index, &snapshot, companion);
            }
        }
    }

    fn copy_rows_from(&mut self, mask: &[bool], other: &Self) {
        let row_len = self.row_len();
        for (index, _) in mask.iter().enumerate().filter(|(_, selected)| **selected) {
            self.data.copy_row(row_len, index, &other.data, index);
        }
    }
}

fn dtype_error(expected: DType, found: DType) -> FractalError {
    FractalError::shape(format!("expected a {expected:?} column, found {found:?}"))
}

fn check_index(index: usize, batch_size: usize) -> Result<()> {
    if index >= batch_size {
        return Err(FractalError::shape(format!(
            "walker index {index} is out of range for a batch of {batch_size}"
        )));
    }
    Ok(())
}

/// Check a `(will_clone, compas)` pair against a batch size before any mutation.
pub fn validate_clone_args(batch_size: usize, will_clone: &[bool], compas: &[usize]) -> Result<()> {
    if will_clone.len() != batch_size || compas.len() != batch_size {
        return Err(FractalError::shape(format!(
            "clone masks of length {}/{} do not match a batch of {batch_size}",
            will_clone.len(),
            compas.len()
        )));
    }
    if let Some(&bad) = compas.iter().find(|&&companion| companion >= batch_size) {
        return Err(FractalError::shape(format!(
            "companion index {bad} is out of range for a batch of {batch_size}"
        )));
    }
    Ok(())
}

/// Capabilities shared by every per-walker container.
pub trait BatchState: Sized {
    /// Number of walkers (leading dimension of every attribute).
    fn batch_size(&self) -> usize;

    /// Batch-size-1 container holding only walker `index`.
    fn walker(&self, index: usize) -> Result<Self>;

    /// Join containers along the walker dimension, preserving input order.
    fn concat(parts: &[Self]) -> Result<Self>;

    /// Copy every attribute of `compas[i]` onto walker `i` wherever
    /// `will_clone[i]` is set, reading from the pre-clone state.
    fn clone_walkers(&mut self, will_clone: &[bool], compas: &[usize]) -> Result<()>;
}

/// Dynamic container mapping attribute names to batched [`Column`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct States {
    batch_size: usize,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl States {
    /// A container with `batch_size` walkers and no attributes.
    #[must_use]
    pub fn empty(batch_size: usize) -> Self {
        Self {
            batch_size,
            names: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Allocate zeroed storage for every attribute declared in `schema`.
    #[must_use]
    pub fn from_schema(batch_size: usize, schema: &Schema) -> Self {
        let (names, columns) = schema
            .iter()
            .map(|(name, spec)| (name.to_string(), Column::zeros(batch_size, spec)))
            .unzip();
        Self {
            batch_size,
            names,
            columns,
        }
    }

    /// Bind explicit columns; every column must hold exactly `batch_size` rows.
    pub fn from_columns<I, S>(batch_size: usize, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Column)>,
        S: Into<String>,
    {
        let mut states = Self::empty(batch_size);
        for (name, column) in fields {
            let name = name.into();
            if column.batch_size() != batch_size {
                return Err(FractalError::shape(format!(
                    "attribute `{name}` holds {} rows, expected {batch_size}",
                    column.batch_size()
                )));
            }
            if states.position(&name).is_some() {
                return Err(FractalError::InvalidConfig("duplicate attribute name"));
            }
            states.names.push(name);
            states.columns.push(column);
        }
        Ok(states)
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|existing| existing == name)
    }

    pub fn get(&self, name: &str) -> Result<&Column> {
        self.position(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| FractalError::InvalidKey(name.to_string()))
    }

    /// Like [`States::get`] but falls back to `default` when `name` is absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, name: &str, default: &'a Column) -> &'a Column {
        self.get(name).unwrap_or(default)
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Column> {
        match self.position(name) {
            Some(idx) => Ok(&mut self.columns[idx]),
            None => Err(FractalError::InvalidKey(name.to_string())),
        }
    }

    /// Replace an existing attribute. Batch size, shape and dtype must match.
    pub fn set(&mut self, name: &str, column: Column) -> Result<()> {
        let slot = self.get_mut(name)?;
        if !slot.same_layout(&column) {
            return Err(FractalError::shape(format!(
                "attribute `{name}` expects {} rows of {:?} {:?}, got {} rows of {:?} {:?}",
                slot.batch_size(),
                slot.dtype(),
                slot.shape(),
                column.batch_size(),
                column.dtype(),
                column.shape()
            )));
        }
        *slot = column;
        Ok(())
    }

    pub fn f64s(&self, name: &str) -> Result<&[f64]> {
        self.get(name)?.as_f64()
    }

    pub fn f64s_mut(&mut self, name: &str) -> Result<&mut [f64]> {
        self.get_mut(name)?.as_f64_mut()
    }

    pub fn bools(&self, name: &str) -> Result<&[bool]> {
        self.get(name)?.as_bool()
    }

    pub fn bools_mut(&mut self, name: &str) -> Result<&mut [bool]> {
        self.get_mut(name)?.as_bool_mut()
    }

    /// Attribute names in declaration order. Call again to restart.
    pub fn keys(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.names.iter().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Column> + Clone + '_ {
        self.columns.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Column)> + Clone + '_ {
        self.keys().zip(self.values())
    }

    /// Lazily materialise one batch-size-1 container per walker.
    pub fn walkers(&self) -> impl Iterator<Item = Result<Self>> + Clone + '_ {
        (0..self.batch_size).map(move |index| self.walker(index))
    }

    /// Schema describing this container's attributes.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.items()
            .fold(Schema::new(), |schema, (name, column)| {
                schema.with(name, column.spec())
            })
    }

    /// Overwrite the attributes present in `other`. Validated before any write.
    pub fn update(&mut self, other: &Self) -> Result<()> {
        if other.batch_size != self.batch_size {
            return Err(FractalError::shape(format!(
                "cannot update a batch of {} with a batch of {}",
                self.batch_size, other.batch_size
            )));
        }
        for (name, column) in other.items() {
            let slot = self.get(name)?;
            if !slot.same_layout(column) {
                return Err(FractalError::shape(format!(
                    "attribute `{name}` changed layout during update"
                )));
            }
        }
        for (name, column) in other.items() {
            let idx = self
                .position(name)
                .ok_or_else(|| FractalError::InvalidKey(name.to_string()))?;
            self.columns[idx] = column.clone();
        }
        Ok(())
    }

    /// Copy the rows selected by `mask` from `other`, which must share this schema.
    pub fn merge_rows(&mut self, mask: &[bool], other: &Self) -> Result<()> {
        if mask.len() != self.batch_size || other.batch_size != self.batch_size {
            return Err(FractalError::shape(format!(
                "cannot merge {} rows using a mask of {} into a batch of {}",
                other.batch_size,
                mask.len(),
                self.batch_size
            )));
        }
        if self.names != other.names
            || self
                .columns
                .iter()
                .zip(&other.columns)
                .any(|(mine, theirs)| !mine.same_layout(theirs))
        {
            return Err(FractalError::shape(
                "cannot merge rows from a container with a different schema",
            ));
        }
        for (mine, theirs) in self.columns.iter_mut().zip(&other.columns) {
            mine.copy_rows_from(mask, theirs);
        }
        Ok(())
    }
}

impl BatchState for States {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn walker(&self, index: usize) -> Result<Self> {
        check_index(index, self.batch_size)?;
        let columns = self
            .columns
            .iter()
            .map(|column| column.row(index))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            batch_size: 1,
            names: self.names.clone(),
            columns,
        })
    }

    fn concat(parts: &[Self]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(FractalError::InvalidConfig(
                "cannot concatenate an empty sequence of states",
            ));
        };
        if let Some(odd) = parts.iter().find(|part| part.names != first.names) {
            return Err(FractalError::shape(format!(
                "cannot join attributes {:?} with attributes {:?}",
                odd.names, first.names
            )));
        }
        let columns = (0..first.columns.len())
            .map(|idx| {
                let pieces: Vec<&Column> = parts.iter().map(|part| &part.columns[idx]).collect();
                Column::concat(&pieces)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            batch_size: parts.iter().map(|part| part.batch_size).sum(),
            names: first.names.clone(),
            columns,
        })
    }

    fn clone_walkers(&mut self, will_clone: &[bool], compas: &[usize]) -> Result<()> {
        validate_clone_args(self.batch_size, will_clone, compas)?;
        if !will_clone.iter().any(|&clone| clone) {
            return Ok(());
        }
        for column in &mut self.columns {
            column.clone_rows(will_clone, compas);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new()
            .with("observs", FieldSpec::vector(2, DType::F64))
            .with("rewards", FieldSpec::scalar(DType::F64))
            .with("ends", FieldSpec::scalar(DType::Bool))
            .with("steps", FieldSpec::scalar(DType::U64))
    }

    fn sample_states() -> States {
        States::from_columns(
            3,
            [
                (
                    "observs",
                    Column::from_f64(vec![2], vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]).expect("observs"),
                ),
                ("rewards", Column::scalar_f64(vec![10.0, 20.0, 30.0])),
                ("ends", Column::scalar_bool(vec![false, true, false])),
                ("steps", Column::from_u64(vec![], vec![7, 8, 9]).expect("steps")),
            ],
        )
        .expect("states")
    }

    #[test]
    fn schema_allocates_zeroed_columns() {
        let states = States::from_schema(4, &sample_schema());
        assert_eq!(states.batch_size(), 4);
        assert_eq!(states.len(), 4);
        for column in states.values() {
            assert_eq!(column.batch_size(), 4);
        }
        assert_eq!(states.f64s("observs").expect("observs"), &[0.0; 8]);
        assert_eq!(states.bools("ends").expect("ends"), &[false; 4]);
        assert_eq!(states.schema(), sample_schema());
    }

    #[test]
    fn explicit_columns_must_agree_on_batch_size() {
        let err = States::from_columns(
            2,
            [
                ("a", Column::scalar_f64(vec![1.0, 2.0])),
                ("b", Column::scalar_f64(vec![1.0, 2.0, 3.0])),
            ],
        )
        .expect_err("mismatched leading dimension");
        assert!(matches!(err, FractalError::ShapeMismatch(_)));
    }

    #[test]
    fn ragged_values_are_rejected() {
        let err = Column::from_f64(vec![3], vec![1.0; 7]).expect_err("ragged rows");
        assert!(matches!(err, FractalError::ShapeMismatch(_)));
    }

    #[test]
    fn missing_keys_fail_unless_default_requested() {
        let states = sample_states();
        assert!(matches!(
            states.get("velocity"),
            Err(FractalError::InvalidKey(name)) if name == "velocity"
        ));
        let fallback = Column::scalar_f64(vec![0.0; 3]);
        assert_eq!(states.get_or("velocity", &fallback), &fallback);
        assert_eq!(
            states.get_or("rewards", &fallback).as_f64().expect("f64"),
            &[10.0, 20.0, 30.0]
        );
    }

    #[test]
    fn set_enforces_fixed_schema() {
        let mut states = sample_states();
        states
            .set("rewards", Column::scalar_f64(vec![1.0, 2.0, 3.0]))
            .expect("same layout");
        assert_eq!(states.f64s("rewards").expect("rewards"), &[1.0, 2.0, 3.0]);

        assert!(matches!(
            states.set("extra", Column::scalar_f64(vec![0.0; 3])),
            Err(FractalError::InvalidKey(_))
        ));
        assert!(matches!(
            states.set("rewards", Column::scalar_f64(vec![0.0; 2])),
            Err(FractalError::ShapeMismatch(_))
        ));
        assert!(matches!(
            states.set("rewards", Column::scalar_bool(vec![true; 3])),
            Err(FractalError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn iterators_are_ordered_and_restartable() {
        let states = sample_states();
        let keys = states.keys();
        let first: Vec<_> = keys.clone().collect();
        let second: Vec<_> = keys.collect();
        assert_eq!(first, vec!["observs", "rewards", "ends", "steps"]);
        assert_eq!(first, second);
        assert_eq!(states.items().count(), 4);
        assert_eq!(states.walkers().count(), 3);
        assert_eq!(states.walkers().count(), 3);
    }

    #[test]
    fn walker_view_and_concat_round_trip() {
        let states = sample_states();
        let pieces = states
            .walkers()
            .collect::<Result<Vec<States>>>()
            .expect("views");
        assert!(pieces.iter().all(|piece| piece.batch_size() == 1));
        for (index, piece) in pieces.iter().enumerate() {
            assert_eq!(piece, &states.walker(index).expect("walker"));
        }
        assert_eq!(
            pieces[1].f64s("observs").expect("observs"),
            &[1.0, 1.5]
        );
        let joined = States::concat(&pieces).expect("concat");
        assert_eq!(joined, states);
        for (index, piece) in pieces.iter().enumerate() {
            assert_eq!(&joined.walker(index).expect("walker"), piece);
        }
    }

    #[test]
    fn walker_index_out_of_range_is_rejected() {
        let states = sample_states();
        assert!(matches!(
            states.walker(3),
            Err(FractalError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn concat_rejects_mismatched_schemas() {
        let a = States::from_columns(1, [("x", Column::scalar_f64(vec![1.0]))]).expect("a");
        let b = States::from_columns(1, [("y", Column::scalar_f64(vec![1.0]))]).expect("b");
        assert!(matches!(
            States::concat(&[a.clone(), b]),
            Err(FractalError::ShapeMismatch(_))
        ));
        let c = States::from_columns(1, [("x", Column::scalar_bool(vec![true]))]).expect("c");
        assert!(matches!(
            States::concat(&[a, c]),
            Err(FractalError::ShapeMismatch(_))
        ));
        assert!(States::concat(&[]).is_err());
    }

    #[test]
    fn clone_reads_from_pre_clone_snapshot() {
        let mut states = sample_states();
        let before = states.clone();
        // Walker 0 copies walker 1 while walker 1 copies walker 2: no cascading.
        let will_clone = [true, true, false];
        let compas = [1, 2, 0];
        states.clone_walkers(&will_clone, &compas).expect("clone");

        for index in 0..3 {
            let expected = if will_clone[index] {
                before.walker(compas[index]).expect("source")
            } else {
                before.walker(index).expect("untouched")
            };
            assert_eq!(states.walker(index).expect("walker"), expected);
        }
        for column in states.values() {
            assert_eq!(column.batch_size(), 3);
        }
    }

    #[test]
    fn clone_validates_before_mutating() {
        let mut states = sample_states();
        let before = states.clone();
        assert!(states.clone_walkers(&[true, false], &[1, 0]).is_err());
        assert!(states.clone_walkers(&[true, false, false], &[5, 0, 0]).is_err());
        assert_eq!(states, before);
    }

    #[test]
    fn update_overwrites_named_attributes_only() {
        let mut states = sample_states();
        let patch =
            States::from_columns(3, [("rewards", Column::scalar_f64(vec![-1.0, -2.0, -3.0]))])
                .expect("patch");
        states.update(&patch).expect("update");
        assert_eq!(states.f64s("rewards").expect("rewards"), &[-1.0, -2.0, -3.0]);
        assert_eq!(states.bools("ends").expect("ends"), &[false, true, false]);
        assert!(states.values().all(|column| column.batch_size() == 3));

        let wrong = States::from_columns(2, [("rewards", Column::scalar_f64(vec![0.0; 2]))])
            .expect("wrong");
        assert!(states.update(&wrong).is_err());
        let unknown = States::from_columns(3, [("bogus", Column::scalar_f64(vec![0.0; 3]))])
            .expect("unknown");
        assert!(matches!(states.update(&unknown), Err(FractalError::InvalidKey(_))));
        assert_eq!(states.f64s("rewards").expect("rewards"), &[-1.0, -2.0, -3.0]);
    }

    #[test]
    fn merge_rows_copies_selected_walkers() {
        let mut states = sample_states();
        let mut other = sample_states();
        other
            .set("rewards", Column::scalar_f64(vec![0.0, 0.0, 0.0]))
            .expect("set");
        states.merge_rows(&[false, true, false], &other).expect("merge");
        assert_eq!(states.f64s("rewards").expect("rewards"), &[10.0, 0.0, 30.0]);
    }
}
