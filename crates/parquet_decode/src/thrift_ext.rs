use thrift::protocol::{TFieldIdentifier, TInputProtocol, TOutputProtocol, TType};

/// Reads and writes the struct to Thrift protocols.
///
/// Unlike [`thrift::protocol::TSerializable`] this uses generics instead of trait objects
pub trait TSerializable: Sized {
    fn read_from_in_protocol<T: TInputProtocol>(i_prot: &mut T) -> thrift::Result<Self>;
    fn write_to_out_protocol<T: TOutputProtocol>(&self, o_prot: &mut T) -> thrift::Result<()>;
}

pub fn invalid_data(msg: impl Into<String>) -> thrift::Error {
    thrift::Error::Protocol(thrift::ProtocolError::new(
        thrift::ProtocolErrorKind::InvalidData,
        msg,
    ))
}

pub fn required<V>(field: &'static str, value: Option<V>) -> thrift::Result<V> {
    value.ok_or_else(|| invalid_data(format!("Missing required field {field}")))
}

/// Field id of a field that isn't a stop field.
pub fn field_id(ident: &TFieldIdentifier) -> thrift::Result<i16> {
    ident
        .id
        .ok_or_else(|| invalid_data(format!("Missing field id in {ident:?}")))
}

pub fn write_i32_field<T: TOutputProtocol>(
    o_prot: &mut T,
    name: &'static str,
    id: i16,
    value: i32,
) -> thrift::Result<()> {
    o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::I32, id))?;
    o_prot.write_i32(value)?;
    o_prot.write_field_end()
}

pub fn write_i64_field<T: TOutputProtocol>(
    o_prot: &mut T,
    name: &'static str,
    id: i16,
    value: i64,
) -> thrift::Result<()> {
    o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::I64, id))?;
    o_prot.write_i64(value)?;
    o_prot.write_field_end()
}

pub fn write_bool_field<T: TOutputProtocol>(
    o_prot: &mut T,
    name: &'static str,
    id: i16,
    value: bool,
) -> thrift::Result<()> {
    o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::Bool, id))?;
    o_prot.write_bool(value)?;
    o_prot.write_field_end()
}

pub fn write_binary_field<T: TOutputProtocol>(
    o_prot: &mut T,
    name: &'static str,
    id: i16,
    value: &[u8],
) -> thrift::Result<()> {
    o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::String, id))?;
    o_prot.write_bytes(value)?;
    o_prot.write_field_end()
}

pub fn write_struct_field<T: TOutputProtocol, S: TSerializable>(
    o_prot: &mut T,
    name: &'static str,
    id: i16,
    value: &S,
) -> thrift::Result<()> {
    o_prot.write_field_begin(&TFieldIdentifier::new(name, TType::Struct, id))?;
    value.write_to_out_protocol(o_prot)?;
    o_prot.write_field_end()
}
