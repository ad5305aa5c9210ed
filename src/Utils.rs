/// reading task files, network text files and structured network documents
pub mod load_from_file;
