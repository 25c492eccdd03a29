pub(crate) mod artists;
pub(crate) mod form;
pub(crate) mod places;
pub(crate) mod products;
pub(crate) mod regions;
pub(crate) mod scores;
pub(crate) mod songs;
