mod convert;

pub use convert::{convert_docx, convert_package, docx_to_markup, ConvertOptions};
