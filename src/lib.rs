//! # apkparser
//!
//! A library for reading Android application packages: the manifest as readable XML with resource
//! references resolved, the strings of the resource table, and the class names and string literals
//! of every bytecode container.
//!
//! # Examples
//!
//! ```no_run
//!  use apkparser::Apk;
//!
//!  let apk = Apk::open("app.apk").unwrap();
//!  println!("{}", apk.manifest().unwrap());
//!  println!("{} classes", apk.dexes().classes.len());
//! ```
//!
pub mod android;
pub mod apk;
pub mod dex;
pub mod inventory;


pub use apk::{to_pretty_json, AllTasks, Apk, ApkError, Artifact, ResourceStrings, Task};
pub use inventory::DexInventory;
