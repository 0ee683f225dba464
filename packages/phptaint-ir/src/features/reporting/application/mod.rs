mod scanner;

pub use scanner::{find_php_files, scan};
