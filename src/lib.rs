// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

#![recursion_limit = "256"]
// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    //missing_docs
)]

#[macro_use]
extern crate amplify_derive;
#[macro_use]
extern crate strict_encoding;

pub mod classifier;
pub mod driver;
pub mod error;
pub mod feerate;
pub mod handlers;
pub mod keys;
pub mod scripts;
pub mod shachain;
pub mod tracked_output;
pub mod txbuilder;
pub mod types;
pub mod wire;

pub use driver::Driver;
pub use error::Error;
