pub mod decomposer;
