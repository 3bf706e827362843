// Pipelines that drive the loader, normalizer, and models over a dataset.

pub mod evaluate;
