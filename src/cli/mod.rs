//! CLI command handlers

pub mod commands;

pub use commands::{
    decode, encode, parse_duplicate_policy, parse_mapping, template_create, template_delete,
    template_list, template_set, template_show,
};
