//! Property tests for the pure transformation layers.

use indexmap::IndexMap;
use proptest::prelude::*;

use flowscribe::importer::mapping::normalize_locator;
use flowscribe::importer::naming::{NameAllocator, slugify};
use flowscribe::scenario::template::{TemplateEnv, substitute};

proptest! {
    // normalize(normalize(s)) == normalize(s)
    #[test]
    fn locator_normalization_is_idempotent(input in ".{0,80}") {
        let once = normalize_locator(&input);
        prop_assert_eq!(normalize_locator(&once), once);
    }

    // substitute(substitute(s, E), E) == substitute(s, E) for defined vars
    #[test]
    fn substitution_is_idempotent(
        prefix in "[a-zA-Z0-9 ._-]{0,20}",
        value in "[a-zA-Z0-9@._-]{0,20}",
        suffix in "[a-zA-Z0-9 ._-]{0,20}",
    ) {
        let mut vars = IndexMap::new();
        vars.insert("x".to_string(), value);
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let input = format!("{prefix}${{vars.x}}{suffix}");

        let mut refs = Vec::new();
        let once = substitute(&input, &env, "step", false, &mut refs).unwrap();
        let twice = substitute(&once, &env, "step", false, &mut refs).unwrap();
        prop_assert_eq!(once, twice);
    }

    // Strings without references pass through untouched.
    #[test]
    fn substitution_without_references_is_identity(input in "[^$]{0,60}") {
        let vars = IndexMap::new();
        let overlay = IndexMap::new();
        let env = TemplateEnv::new(&vars, &overlay);
        let mut refs = Vec::new();
        let out = substitute(&input, &env, "step", false, &mut refs).unwrap();
        prop_assert_eq!(out, input);
    }

    // Every allocated name matches the verb-object shape and is unique.
    #[test]
    fn allocated_names_keep_shape_and_uniqueness(objects in prop::collection::vec(".{0,40}", 1..12)) {
        let shape = regex::Regex::new(r"^[a-z]+(-[a-z0-9]+)+$").unwrap();
        let mut alloc = NameAllocator::new();
        let mut seen = std::collections::HashSet::new();
        for object in &objects {
            let name = alloc.allocate("click", &slugify(object));
            prop_assert!(shape.is_match(&name), "bad shape: {}", name);
            prop_assert!(seen.insert(name));
        }
    }

    // Slugs are always ASCII kebab-case.
    #[test]
    fn slugs_are_kebab(input in ".{0,60}") {
        let slug = slugify(&input);
        prop_assert!(
            slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
            "bad slug: {slug:?}"
        );
        prop_assert!(!slug.starts_with('-'));
        prop_assert!(!slug.ends_with('-'));
    }
}
