pub(crate) const YAML_HINTS: [(&str, &str); 6] = [
    (
        "did not find expected '-'",
        "List each step on its own line starting with '- '.",
    ),
    (
        "mapping values are not allowed",
        "Quote step lines that contain ': ' so YAML reads them as text.",
    ),
    (
        "found character that cannot start any token",
        "Remove stray characters and indent with spaces only.",
    ),
    (
        "missing field `scenarios`",
        "Add a `scenarios` list; each entry needs a `name` and `steps`.",
    ),
    (
        "missing field `feature`",
        "Name the feature with a top-level `feature` key.",
    ),
    (
        "unknown field",
        "Suites accept only `feature`, `background` and `scenarios`.",
    ),
];
