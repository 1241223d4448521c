pub(crate) mod owner;
pub(crate) mod report;
pub(crate) mod select;
