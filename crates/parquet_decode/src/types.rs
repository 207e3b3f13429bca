//! Schema types as they appear in file metadata.

/// Physical types representable in parquet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray(usize),
}

impl PhysicalType {
    /// Width in bytes of a single plain encoded value, None for variable
    /// length and bit packed types.
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Int32 | Self::Float => Some(4),
            Self::Int64 | Self::Double => Some(8),
            Self::Int96 => Some(12),
            Self::FixedLenByteArray(len) => Some(*len),
            Self::Boolean | Self::ByteArray => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    Required,
    Optional,
    Repeated,
}

/// Parquet converted type, deprecated.
///
/// Only the variants that change how a column is surfaced are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertedType {
    Utf8,
    Enum,
    Json,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    String,
    Enum,
    Json,
    Integer { bit_width: i8, is_signed: bool },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub repetition: Option<Repetition>,
    pub converted_type: Option<ConvertedType>,
    pub logical_type: Option<LogicalType>,
    pub id: Option<i32>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, repetition: Repetition) -> Self {
        TypeInfo {
            name: name.into(),
            repetition: Some(repetition),
            converted_type: None,
            logical_type: None,
            id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParquetType {
    Primitive(PrimitiveType),
    Group(GroupType),
}

impl ParquetType {
    pub fn primitive(
        name: impl Into<String>,
        repetition: Repetition,
        physical_type: PhysicalType,
    ) -> Self {
        ParquetType::Primitive(PrimitiveType {
            info: TypeInfo::new(name, repetition),
            physical_type,
        })
    }

    pub fn group(
        name: impl Into<String>,
        repetition: Repetition,
        fields: Vec<ParquetType>,
    ) -> Self {
        ParquetType::Group(GroupType {
            info: TypeInfo::new(name, repetition),
            fields,
        })
    }

    /// Set the logical type on this node.
    pub fn with_logical_type(mut self, logical_type: LogicalType) -> Self {
        self.info_mut().logical_type = Some(logical_type);
        self
    }

    pub fn with_converted_type(mut self, converted_type: ConvertedType) -> Self {
        self.info_mut().converted_type = Some(converted_type);
        self
    }

    pub fn info(&self) -> &TypeInfo {
        match self {
            Self::Primitive(p) => &p.info,
            Self::Group(g) => &g.info,
        }
    }

    fn info_mut(&mut self) -> &mut TypeInfo {
        match self {
            Self::Primitive(p) => &mut p.info,
            Self::Group(g) => &mut g.info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    /// Repetition of this node, the root of a schema may not have one.
    pub fn repetition(&self) -> Repetition {
        self.info().repetition.unwrap_or(Repetition::Required)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveType {
    pub info: TypeInfo,
    pub physical_type: PhysicalType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupType {
    pub info: TypeInfo,
    pub fields: Vec<ParquetType>,
}
