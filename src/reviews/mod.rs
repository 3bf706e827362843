// Review data: loading the nested corpus and cleaning comment text.

pub mod loader;
pub mod normalize;
pub mod record;
