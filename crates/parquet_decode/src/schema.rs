//! Column descriptors derived from a file schema.

use rayexec_bullet::datatype::{DataType, StructTypeMeta};
use rayexec_error::{not_implemented, Result};

use crate::types::{
    ConvertedType, LogicalType, ParquetType, PhysicalType, PrimitiveType, Repetition,
};

/// A node in the schema along with its levels.
///
/// Ids are assigned in pre-order, starting with 0 for the root. Leaf
/// indices count leaves in the same order and index into a row group's
/// column chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTypeDescriptor {
    pub id: usize,
    pub name: String,
    pub datatype: DataType,
    pub repetition: Repetition,
    /// Set for leaf columns.
    pub physical_type: Option<PhysicalType>,
    pub leaf_index: Option<usize>,
    pub max_define: i16,
    pub max_repeat: i16,
    pub children: Vec<ColumnTypeDescriptor>,
}

impl ColumnTypeDescriptor {
    /// Build descriptors for the schema rooted at `root`.
    pub fn try_from_schema(root: &ParquetType) -> Result<Self> {
        let mut ids = IdState::default();
        // The root's repetition, if any, doesn't contribute to levels.
        build(root, Repetition::Required, 0, 0, &mut ids)
    }

    pub fn is_leaf(&self) -> bool {
        self.physical_type.is_some()
    }

    pub fn child(&self, name: &str) -> Option<&ColumnTypeDescriptor> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First leaf in pre-order, may be this node.
    pub fn first_leaf(&self) -> Option<&ColumnTypeDescriptor> {
        if self.is_leaf() {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.first_leaf())
    }

    /// Number of nodes in this subtree, including this one.
    pub fn num_nodes(&self) -> usize {
        1 + self.children.iter().map(|c| c.num_nodes()).sum::<usize>()
    }
}

#[derive(Debug, Default)]
struct IdState {
    next_id: usize,
    next_leaf: usize,
}

fn build(
    node: &ParquetType,
    repetition: Repetition,
    parent_define: i16,
    parent_repeat: i16,
    ids: &mut IdState,
) -> Result<ColumnTypeDescriptor> {
    let (max_define, max_repeat) = match repetition {
        Repetition::Required => (parent_define, parent_repeat),
        Repetition::Optional => (parent_define + 1, parent_repeat),
        Repetition::Repeated => (parent_define + 1, parent_repeat + 1),
    };

    let id = ids.next_id;
    ids.next_id += 1;

    match node {
        ParquetType::Primitive(prim) => {
            let leaf_index = ids.next_leaf;
            ids.next_leaf += 1;

            Ok(ColumnTypeDescriptor {
                id,
                name: prim.info.name.clone(),
                datatype: leaf_datatype(prim)?,
                repetition,
                physical_type: Some(prim.physical_type),
                leaf_index: Some(leaf_index),
                max_define,
                max_repeat,
                children: Vec::new(),
            })
        }
        ParquetType::Group(group) => {
            let children = group
                .fields
                .iter()
                .map(|field| build(field, field.repetition(), max_define, max_repeat, ids))
                .collect::<Result<Vec<_>>>()?;

            let datatype = DataType::Struct(StructTypeMeta {
                fields: children
                    .iter()
                    .map(|c| (c.name.clone(), c.datatype.clone()))
                    .collect(),
            });

            Ok(ColumnTypeDescriptor {
                id,
                name: group.info.name.clone(),
                datatype,
                repetition,
                physical_type: None,
                leaf_index: None,
                max_define,
                max_repeat,
                children,
            })
        }
    }
}

fn leaf_datatype(prim: &PrimitiveType) -> Result<DataType> {
    let logical = prim.info.logical_type;
    let converted = prim.info.converted_type;

    Ok(match prim.physical_type {
        PhysicalType::Boolean => DataType::Boolean,
        PhysicalType::Int32 => match (logical, converted) {
            (Some(LogicalType::Integer { is_signed: false, .. }), _)
            | (_, Some(ConvertedType::Uint8 | ConvertedType::Uint16 | ConvertedType::Uint32)) => {
                not_implemented!("Unsigned integers for column '{}'", prim.info.name)
            }
            (Some(LogicalType::Integer { bit_width: 8, .. }), _)
            | (_, Some(ConvertedType::Int8)) => DataType::Int8,
            (Some(LogicalType::Integer { bit_width: 16, .. }), _)
            | (_, Some(ConvertedType::Int16)) => DataType::Int16,
            _ => DataType::Int32,
        },
        PhysicalType::Int64 => match (logical, converted) {
            (Some(LogicalType::Integer { is_signed: false, .. }), _)
            | (_, Some(ConvertedType::Uint64)) => {
                not_implemented!("Unsigned integers for column '{}'", prim.info.name)
            }
            _ => DataType::Int64,
        },
        PhysicalType::Float => DataType::Float32,
        PhysicalType::Double => DataType::Float64,
        PhysicalType::ByteArray => match (logical, converted) {
            (Some(LogicalType::String | LogicalType::Enum | LogicalType::Json), _)
            | (_, Some(ConvertedType::Utf8 | ConvertedType::Enum | ConvertedType::Json)) => {
                DataType::Utf8
            }
            _ => DataType::Binary,
        },
        other @ (PhysicalType::Int96 | PhysicalType::FixedLenByteArray(_)) => {
            not_implemented!("{other:?} for column '{}'", prim.info.name)
        }
    })
}
