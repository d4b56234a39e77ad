//! Code tables compiled in from `sheet-inspect-markers/data/*_CODES.json`.

#![allow(non_upper_case_globals)]

include!(concat!(env!("OUT_DIR"), "/builtins.rs"));
