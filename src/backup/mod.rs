pub mod archive;
pub mod backup_config;
pub mod compress;
pub mod copy;
pub mod expand;
pub mod file_ext;
pub mod filter;
pub mod finish;
pub mod outcome;
pub mod progress;
pub mod result_error;
pub mod retention;
pub mod scaffold;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
