// 🌐 Language codes used by the versions page filter

/// Language name → language id accepted by `?language=` on the versions page.
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("Afrikaans", "2677"),
    ("Arabic", "2178"),
    ("Basque", "2711"),
    ("Bulgarian", "2675"),
    ("Catalan", "2179"),
    ("Chinese", "2181"),
    ("Croatian", "2656"),
    ("Czech", "2180"),
    ("Danish", "2182"),
    ("Dutch", "2183"),
    ("English", "2184"),
    ("Estonian", "2185"),
    ("Finnish", "2186"),
    ("French", "2187"),
    ("German", "2188"),
    ("Greek", "2189"),
    ("Hebrew", "2190"),
    ("Hungarian", "2191"),
    ("Icelandic", "2347"),
    ("Italian", "2193"),
    ("Japanese", "2194"),
    ("Korean", "2195"),
    ("Latvian", "2196"),
    ("Lithuanian", "2197"),
    ("Macedonian", "3069"),
    ("Norwegian", "2198"),
    ("Polish", "2199"),
    ("Portuguese", "2200"),
    ("Romanian", "2201"),
    ("Russian", "2202"),
    ("Serbian", "2681"),
    ("Slovak", "2206"),
    ("Slovenian", "2207"),
    ("Spanish", "2203"),
    ("Swedish", "2204"),
    ("Thai", "2709"),
];

/// Look up a language id by name. Names are matched exactly, after trimming.
pub fn language_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    LANGUAGE_CODES
        .iter()
        .find(|(language, _)| *language == name)
        .map(|(_, code)| *code)
}
