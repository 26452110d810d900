//! Reference chasing over best-match resource values.

use crate::android::config::ResConfig;
use crate::android::res_table::ResTable;
use crate::android::value::{Reference, ResId, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Upper bound on references followed before giving up on a chain.
pub const MAX_REFERENCE_DEPTH: usize = 40;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveError {
    /// The reference carries no id, or one without package and type bytes.
    InvalidId(Option<ResId>),
    /// The id names a package the table does not contain.
    UnknownPackage(ResId),
    /// No value matches the target configuration.
    Missing(ResId),
    /// The chain is longer than [`MAX_REFERENCE_DEPTH`] or loops.
    TooDeep(ResId),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidId(Some(id)) => write!(f, "invalid resource id {id}"),
            ResolveError::InvalidId(None) => write!(f, "null resource reference"),
            ResolveError::UnknownPackage(id) => {
                write!(f, "resource {id} names unknown package 0x{:02x}", id.package_id())
            }
            ResolveError::Missing(id) => write!(f, "no value for resource {id}"),
            ResolveError::TooDeep(id) => write!(
                f,
                "reference chain from {id} exceeds {MAX_REFERENCE_DEPTH} steps"
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Source of one selected value per resource id.
pub trait ValueLookup {
    fn has_package(&self, package_id: u8) -> bool;
    fn lookup(&self, id: ResId) -> Option<&Value>;
}

/// Best value of every entry for one fixed target, computed once.
#[derive(Clone, Debug, Default)]
pub struct TableIndex {
    packages: BTreeSet<u8>,
    values: HashMap<ResId, Value>,
}

impl TableIndex {
    pub fn build(table: &ResTable, target: &ResConfig) -> Self {
        let packages = table.packages().iter().map(|package| package.id).collect();
        let values = table
            .entries()
            .filter(|entry| entry.id.is_valid())
            .filter_map(|entry| {
                let value = crate::android::config::best_value(&entry.values, target)?;
                Some((entry.id, value.clone()))
            })
            .collect();
        TableIndex { packages, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ValueLookup for TableIndex {
    fn has_package(&self, package_id: u8) -> bool {
        self.packages.contains(&package_id)
    }

    fn lookup(&self, id: ResId) -> Option<&Value> {
        self.values.get(&id)
    }
}

/// Selects values on demand for a target other than the one the index was built for.
pub struct LocaleView<'t> {
    table: &'t ResTable,
    target: ResConfig,
}

impl<'t> LocaleView<'t> {
    pub fn new(table: &'t ResTable, target: ResConfig) -> Self {
        LocaleView { table, target }
    }
}

impl ValueLookup for LocaleView<'_> {
    fn has_package(&self, package_id: u8) -> bool {
        self.table.package(package_id).is_some()
    }

    fn lookup(&self, id: ResId) -> Option<&Value> {
        self.table.best_value(id, &self.target)
    }
}

/// Follow `reference` until a non-reference value is found.
pub fn resolve<'l, L>(reference: &Reference, lookup: &'l L) -> Result<&'l Value, ResolveError>
where
    L: ValueLookup + ?Sized,
{
    let start = match reference.id {
        Some(id) if id.is_valid() => id,
        other => return Err(ResolveError::InvalidId(other)),
    };
    if !lookup.has_package(start.package_id()) {
        return Err(ResolveError::UnknownPackage(start));
    }

    let mut current = start;
    for _ in 0..MAX_REFERENCE_DEPTH {
        let value = lookup.lookup(current).ok_or(ResolveError::Missing(current))?;
        match value {
            Value::Reference(next) => match next.id {
                Some(id) => current = id,
                None => return Err(ResolveError::InvalidId(None)),
            },
            _ => return Ok(value),
        }
    }
    Err(ResolveError::TooDeep(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::value::{Primitive, PrimitiveKind};

    #[derive(Default)]
    struct MapLookup(HashMap<ResId, Value>);

    impl MapLookup {
        fn with(mut self, id: u32, value: Value) -> Self {
            self.0.insert(ResId(id), value);
            self
        }
    }

    impl ValueLookup for MapLookup {
        fn has_package(&self, package_id: u8) -> bool {
            package_id == 0x7f
        }

        fn lookup(&self, id: ResId) -> Option<&Value> {
            self.0.get(&id)
        }
    }

    fn reference(id: u32) -> Value {
        Value::Reference(Reference::to(ResId(id)))
    }

    fn chain(length: u32) -> MapLookup {
        let mut lookup = MapLookup::default();
        for i in 0..length {
            lookup = lookup.with(0x7f01_0000 + i, reference(0x7f01_0000 + i + 1));
        }
        lookup.with(0x7f01_0000 + length, Value::String("end".into()))
    }

    #[test]
    fn direct_value() {
        let lookup = MapLookup::default().with(0x7f01_0000, Value::String("Example".into()));
        let value = resolve(&Reference::to(ResId(0x7f01_0000)), &lookup).expect("resolves");
        assert_eq!(value, &Value::String("Example".into()));
    }

    #[test]
    fn follows_reference_to_primitive() {
        let number = Value::Primitive(Primitive::new(PrimitiveKind::IntDec, 42));
        let lookup = MapLookup::default()
            .with(0x7f01_0000, reference(0x7f02_0000))
            .with(0x7f02_0000, number.clone());
        assert_eq!(resolve(&Reference::to(ResId(0x7f01_0000)), &lookup), Ok(&number));
    }

    #[test]
    fn chains_within_bound_terminate() {
        let lookup = chain(39);
        let value = resolve(&Reference::to(ResId(0x7f01_0000)), &lookup).expect("resolves");
        assert_eq!(value, &Value::String("end".into()));
    }

    #[test]
    fn overlong_chains_fail() {
        let lookup = chain(40);
        assert_eq!(
            resolve(&Reference::to(ResId(0x7f01_0000)), &lookup),
            Err(ResolveError::TooDeep(ResId(0x7f01_0000)))
        );
    }

    #[test]
    fn cycles_fail() {
        let lookup = MapLookup::default()
            .with(0x7f01_0000, reference(0x7f01_0001))
            .with(0x7f01_0001, reference(0x7f01_0000));
        assert!(matches!(
            resolve(&Reference::to(ResId(0x7f01_0000)), &lookup),
            Err(ResolveError::TooDeep(_))
        ));
        let self_loop = MapLookup::default().with(0x7f01_0000, reference(0x7f01_0000));
        assert!(resolve(&Reference::to(ResId(0x7f01_0000)), &self_loop).is_err());
    }

    #[test]
    fn invalid_and_unknown_ids_fail_before_lookup() {
        let lookup = MapLookup::default().with(0x0101_0000, Value::String("platform".into()));
        assert_eq!(
            resolve(&Reference::to(ResId(0x0101_0000)), &lookup),
            Err(ResolveError::UnknownPackage(ResId(0x0101_0000)))
        );
        assert_eq!(
            resolve(&Reference::to(ResId(0x7f00_0001)), &lookup),
            Err(ResolveError::InvalidId(Some(ResId(0x7f00_0001))))
        );
        let null = Reference { id: None, ..Reference::to(ResId(0)) };
        assert_eq!(resolve(&null, &lookup), Err(ResolveError::InvalidId(None)));
    }

    #[test]
    fn missing_target_fails() {
        let lookup = MapLookup::default().with(0x7f01_0000, reference(0x7f09_0009));
        assert_eq!(
            resolve(&Reference::to(ResId(0x7f01_0000)), &lookup),
            Err(ResolveError::Missing(ResId(0x7f09_0009)))
        );
    }
}
