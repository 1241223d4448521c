pub(crate) mod converter;
pub(crate) mod factory;
pub(crate) mod meta;
pub(crate) mod module;
