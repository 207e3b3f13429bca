pub mod array;
pub mod batch;
pub mod bitmap;
pub mod datatype;
pub mod scalar;
