//! Name inflection for generated identifiers.
//!
//! ```
//! use sqlmill_schema::inflect;
//!
//! assert_eq!(inflect::camelize("user_roles"), "UserRoles");
//! assert_eq!(inflect::singularize("categories"), "category");
//! assert_eq!(inflect::kebab("UserRoles"), "user-roles");
//! assert_eq!(inflect::field_name("type"), "r#type");
//! ```

/// Words the suffix rules get wrong.
const IRREGULAR: &[(&str, &str)] = &[
    ("people", "person"),
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("vertices", "vertex"),
];

/// Words whose singular and plural agree.
const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "information",
    "metadata",
    "news",
    "series",
    "sheep",
    "species",
    "status",
];

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Splits an identifier into lowercase words at `_`, `-`, spaces, dots
/// and lower-to-upper transitions.
pub fn words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in s.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `user_roles` -> `UserRoles`.
pub fn camelize(s: &str) -> String {
    words(s)
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// `UserRoles` -> `user_roles`.
pub fn snake(s: &str) -> String {
    words(s).join("_")
}

/// `user_roles` -> `user-roles`.
pub fn kebab(s: &str) -> String {
    words(s).join("-")
}

/// Singular form of the last word of a snake_case name.
pub fn singularize(s: &str) -> String {
    match s.rfind('_') {
        Some(i) => format!("{}_{}", &s[..i], singular_word(&s[i + 1..])),
        None => singular_word(s),
    }
}

fn singular_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, singular)) = IRREGULAR.iter().find(|(plural, _)| *plural == lower) {
        return (*singular).to_string();
    }

    let strip = |n: usize, suffix: &str| format!("{}{}", &word[..word.len() - n], suffix);
    if lower.ends_with("ies") && lower.len() > 3 {
        strip(3, "y")
    } else if lower.ends_with("sses")
        || lower.ends_with("ches")
        || lower.ends_with("shes")
        || lower.ends_with("xes")
        || lower.ends_with("zzes")
    {
        strip(2, "")
    } else if lower.ends_with("uses") {
        strip(2, "")
    } else if lower.ends_with('s')
        && !lower.ends_with("ss")
        && !lower.ends_with("us")
        && !lower.ends_with("is")
        && lower.len() > 1
    {
        strip(1, "")
    } else {
        word.to_string()
    }
}

/// A valid Rust field identifier for a column name.
///
/// The name is snake-cased; keywords become raw identifiers and names
/// starting with a digit get a leading underscore.
pub fn field_name(column: &str) -> String {
    let mut name = snake(column);
    if name.is_empty() {
        return "_".to_string();
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    if matches!(name.as_str(), "self" | "super" | "crate" | "Self") {
        name.push('_');
    } else if KEYWORDS.contains(&name.as_str()) {
        name.insert_str(0, "r#");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words() {
        assert_eq!(words("first_name"), vec!["first", "name"]);
        assert_eq!(words("FirstName"), vec!["first", "name"]);
        assert_eq!(words("order-items v2"), vec!["order", "items", "v2"]);
        assert!(words("__").is_empty());
    }

    #[test]
    fn test_camelize() {
        assert_eq!(camelize("users"), "Users");
        assert_eq!(camelize("user_roles"), "UserRoles");
        assert_eq!(camelize("public"), "Public");
    }

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("user_roles"), "user_role");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("branches"), "branch");
        assert_eq!(singularize("buses"), "bus");
        assert_eq!(singularize("people"), "person");
        assert_eq!(singularize("order_status"), "order_status");
        assert_eq!(singularize("migrations"), "migration");
        assert_eq!(singularize("analysis"), "analysis");
        assert_eq!(singularize("user"), "user");
    }

    #[test]
    fn test_kebab_and_snake() {
        assert_eq!(kebab("user_roles"), "user-roles");
        assert_eq!(kebab("UserRoles"), "user-roles");
        assert_eq!(snake("LastName"), "last_name");
    }

    #[test]
    fn test_field_name() {
        assert_eq!(field_name("first_name"), "first_name");
        assert_eq!(field_name("ID"), "id");
        assert_eq!(field_name("type"), "r#type");
        assert_eq!(field_name("self"), "self_");
        assert_eq!(field_name("2fa"), "_2fa");
        assert_eq!(field_name("e-mail"), "e_mail");
    }
}
