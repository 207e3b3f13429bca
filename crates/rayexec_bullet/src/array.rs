use std::borrow::Cow;
use std::sync::Arc;

use rayexec_error::{not_implemented, RayexecError, Result};

use crate::bitmap::Bitmap;
use crate::datatype::{DataType, StructTypeMeta};
use crate::scalar::ScalarValue;

/// Contiguous storage for variable length values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarlenStorage {
    /// Offsets into `data`, always one more than the number of values.
    offsets: Vec<usize>,
    data: Vec<u8>,
}

impl Default for VarlenStorage {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}

impl VarlenStorage {
    pub fn with_capacity(num_values: usize, data_capacity: usize) -> Self {
        let mut offsets = Vec::with_capacity(num_values + 1);
        offsets.push(0);
        VarlenStorage {
            offsets,
            data: Vec::with_capacity(data_capacity),
        }
    }

    pub fn push(&mut self, value: &[u8]) {
        self.data.extend_from_slice(value);
        self.offsets.push(self.data.len());
    }

    pub fn get(&self, idx: usize) -> Option<&[u8]> {
        let start = *self.offsets.get(idx)?;
        let end = *self.offsets.get(idx + 1)?;
        Some(&self.data[start..end])
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.offsets
            .windows(2)
            .map(|w| &self.data[w[0]..w[1]])
    }
}

impl<'a> FromIterator<&'a [u8]> for VarlenStorage {
    fn from_iter<T: IntoIterator<Item = &'a [u8]>>(iter: T) -> Self {
        let mut storage = VarlenStorage::default();
        for v in iter {
            storage.push(v);
        }
        storage
    }
}

/// Children of a struct array.
#[derive(Debug, Clone, PartialEq)]
pub struct StructStorage {
    pub children: Vec<Array>,
    /// Needed since a struct may have no children but still have rows.
    pub len: usize,
}

/// Physical values of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Null(usize),
    Boolean(Bitmap),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Binary(VarlenStorage),
    Struct(StructStorage),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            Self::Null(len) => *len,
            Self::Boolean(b) => b.len(),
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Binary(v) => v.len(),
            Self::Struct(s) => s.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! impl_from_vec {
    ($prim:ty, $variant:ident) => {
        impl From<Vec<$prim>> for ArrayData {
            fn from(value: Vec<$prim>) -> Self {
                ArrayData::$variant(value)
            }
        }
    };
}

impl_from_vec!(i8, Int8);
impl_from_vec!(i16, Int16);
impl_from_vec!(i32, Int32);
impl_from_vec!(i64, Int64);
impl_from_vec!(f32, Float32);
impl_from_vec!(f64, Float64);

/// A logical array with an optional validity bitmap.
///
/// A missing validity bitmap means every value is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    datatype: DataType,
    /// "True" values indicate the value at index is valid, "false" indicates
    /// null.
    validity: Option<Arc<Bitmap>>,
    data: ArrayData,
}

impl Array {
    pub fn try_new(
        datatype: DataType,
        validity: Option<Arc<Bitmap>>,
        data: ArrayData,
    ) -> Result<Self> {
        if let Some(validity) = &validity {
            if validity.len() != data.len() {
                return Err(RayexecError::new(format!(
                    "Validity length {} does not match data length {}",
                    validity.len(),
                    data.len()
                )));
            }
        }

        let matches = matches!(
            (&datatype, &data),
            (DataType::Null, ArrayData::Null(_))
                | (DataType::Boolean, ArrayData::Boolean(_))
                | (DataType::Int8, ArrayData::Int8(_))
                | (DataType::Int16, ArrayData::Int16(_))
                | (DataType::Int32, ArrayData::Int32(_))
                | (DataType::Int64, ArrayData::Int64(_))
                | (DataType::Float32, ArrayData::Float32(_))
                | (DataType::Float64, ArrayData::Float64(_))
                | (DataType::Utf8, ArrayData::Binary(_))
                | (DataType::Binary, ArrayData::Binary(_))
                | (DataType::Struct(_), ArrayData::Struct(_))
        );
        if !matches {
            return Err(RayexecError::new(format!(
                "Array data does not match datatype {datatype}"
            )));
        }

        Ok(Array {
            datatype,
            validity,
            data,
        })
    }

    pub fn new_null(len: usize) -> Self {
        Array {
            datatype: DataType::Null,
            validity: None,
            data: ArrayData::Null(len),
        }
    }

    /// Create a struct array from named children.
    pub fn try_new_struct(
        children: Vec<(String, Array)>,
        validity: Option<Arc<Bitmap>>,
        len: usize,
    ) -> Result<Self> {
        for (name, child) in &children {
            if child.len() != len {
                return Err(RayexecError::new(format!(
                    "Struct child '{name}' has length {}, expected {len}",
                    child.len()
                )));
            }
        }

        let datatype = DataType::Struct(StructTypeMeta {
            fields: children
                .iter()
                .map(|(name, child)| (name.clone(), child.datatype.clone()))
                .collect(),
        });
        let children = children.into_iter().map(|(_, child)| child).collect();

        Array::try_new(
            datatype,
            validity,
            ArrayData::Struct(StructStorage { children, len }),
        )
    }

    /// Create an array with `len` copies of a scalar.
    pub fn try_new_constant(scalar: &ScalarValue, len: usize) -> Result<Self> {
        let data = match scalar {
            ScalarValue::Null => return Ok(Self::new_null(len)),
            ScalarValue::Boolean(v) => ArrayData::Boolean(if *v {
                Bitmap::new_with_all_true(len)
            } else {
                Bitmap::new_with_all_false(len)
            }),
            ScalarValue::Int8(v) => ArrayData::Int8(vec![*v; len]),
            ScalarValue::Int16(v) => ArrayData::Int16(vec![*v; len]),
            ScalarValue::Int32(v) => ArrayData::Int32(vec![*v; len]),
            ScalarValue::Int64(v) => ArrayData::Int64(vec![*v; len]),
            ScalarValue::Float32(v) => ArrayData::Float32(vec![*v; len]),
            ScalarValue::Float64(v) => ArrayData::Float64(vec![*v; len]),
            ScalarValue::Utf8(v) => {
                ArrayData::Binary(std::iter::repeat(v.as_bytes()).take(len).collect())
            }
            ScalarValue::Binary(v) => {
                ArrayData::Binary(std::iter::repeat(v.as_ref()).take(len).collect())
            }
            ScalarValue::Struct(_) => not_implemented!("constant struct arrays"),
        };

        Array::try_new(scalar.datatype(), None, data)
    }

    pub fn datatype(&self) -> &DataType {
        &self.datatype
    }

    pub fn validity(&self) -> Option<&Arc<Bitmap>> {
        self.validity.as_ref()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the validity at the given index, None if out of bounds.
    pub fn is_valid(&self, idx: usize) -> Option<bool> {
        if idx >= self.len() {
            return None;
        }
        if matches!(self.data, ArrayData::Null(_)) {
            return Some(false);
        }

        Some(match &self.validity {
            Some(validity) => validity.value(idx),
            None => true,
        })
    }

    pub fn null_count(&self) -> usize {
        match (&self.data, &self.validity) {
            (ArrayData::Null(len), _) => *len,
            (_, Some(validity)) => validity.len() - validity.popcnt(),
            (_, None) => 0,
        }
    }

    /// Get a scalar value at the given index.
    pub fn scalar(&self, idx: usize) -> Option<ScalarValue> {
        if !self.is_valid(idx)? {
            return Some(ScalarValue::Null);
        }

        Some(match &self.data {
            ArrayData::Null(_) => ScalarValue::Null,
            ArrayData::Boolean(v) => ScalarValue::Boolean(v.value(idx)),
            ArrayData::Int8(v) => ScalarValue::Int8(v[idx]),
            ArrayData::Int16(v) => ScalarValue::Int16(v[idx]),
            ArrayData::Int32(v) => ScalarValue::Int32(v[idx]),
            ArrayData::Int64(v) => ScalarValue::Int64(v[idx]),
            ArrayData::Float32(v) => ScalarValue::Float32(v[idx]),
            ArrayData::Float64(v) => ScalarValue::Float64(v[idx]),
            ArrayData::Binary(v) => {
                let bytes = v.get(idx)?;
                match self.datatype {
                    DataType::Utf8 => ScalarValue::Utf8(String::from_utf8_lossy(bytes)),
                    _ => ScalarValue::Binary(Cow::Borrowed(bytes)),
                }
            }
            ArrayData::Struct(s) => ScalarValue::Struct(
                s.children
                    .iter()
                    .map(|c| c.scalar(idx))
                    .collect::<Option<_>>()?,
            ),
        })
    }

    /// Expand this array so that its values land on the set positions of
    /// `present`.
    ///
    /// Unset positions get placeholder values that are marked valid. The
    /// array's length must equal the number of set bits.
    pub fn expand_placeholders(self, present: &Bitmap) -> Result<Array> {
        if present.popcnt() != self.len() {
            return Err(RayexecError::new(format!(
                "Cannot expand array of length {} using bitmap with {} set bits",
                self.len(),
                present.popcnt()
            )));
        }

        let validity = self
            .validity
            .map(|validity| Arc::new(expand_bitmap(&validity, present)));

        let data = match self.data {
            ArrayData::Null(_) => ArrayData::Null(present.len()),
            ArrayData::Boolean(v) => ArrayData::Boolean(expand_bitmap(&v, present)),
            ArrayData::Int8(v) => ArrayData::Int8(insert_placeholder_values(v, present)),
            ArrayData::Int16(v) => ArrayData::Int16(insert_placeholder_values(v, present)),
            ArrayData::Int32(v) => ArrayData::Int32(insert_placeholder_values(v, present)),
            ArrayData::Int64(v) => ArrayData::Int64(insert_placeholder_values(v, present)),
            ArrayData::Float32(v) => ArrayData::Float32(insert_placeholder_values(v, present)),
            ArrayData::Float64(v) => ArrayData::Float64(insert_placeholder_values(v, present)),
            ArrayData::Binary(v) => {
                let mut values = v.iter();
                let mut out = VarlenStorage::with_capacity(present.len(), v.data.len());
                for is_present in present.iter() {
                    if is_present {
                        out.push(values.next().unwrap_or_default());
                    } else {
                        out.push(&[]);
                    }
                }
                ArrayData::Binary(out)
            }
            ArrayData::Struct(s) => {
                let children = s
                    .children
                    .into_iter()
                    .map(|c| c.expand_placeholders(present))
                    .collect::<Result<Vec<_>>>()?;
                ArrayData::Struct(StructStorage {
                    children,
                    len: present.len(),
                })
            }
        };

        Array::try_new(self.datatype, validity, data)
    }
}

/// Expand `bitmap` onto the set positions of `present`, filling the rest with
/// set bits.
fn expand_bitmap(bitmap: &Bitmap, present: &Bitmap) -> Bitmap {
    let mut src = bitmap.iter();
    present
        .iter()
        .map(|is_present| if is_present { src.next().unwrap_or(true) } else { true })
        .collect()
}

/// Insert placeholder values into the vec according to the `present` bitmap.
///
/// The resulting vec will have its length equal to the bitmap's length.
fn insert_placeholder_values<T: Default>(mut values: Vec<T>, present: &Bitmap) -> Vec<T> {
    let num_values = values.len();
    values.resize_with(present.len(), T::default);

    // Walk backwards so nothing gets overwritten before it's moved. Positions
    // past the current index always hold defaults.
    for (current_idx, new_idx) in (0..num_values).rev().zip(present.index_iter().rev()) {
        if current_idx == new_idx {
            break;
        }
        values.swap(current_idx, new_idx);
    }

    values
}
