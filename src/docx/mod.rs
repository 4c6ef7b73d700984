pub mod changes;
pub mod comments;
pub mod fixture;
pub mod package;
pub mod structure;
pub mod xml;
