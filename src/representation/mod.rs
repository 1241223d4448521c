pub(crate) mod repr;
