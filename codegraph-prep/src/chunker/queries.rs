use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use tree_sitter::Query;

use crate::chunk::ChunkType;
use crate::errors::{ChunkerError, Result};

use super::SupportedLanguage;

const JS_DECLARATIONS: &str = r#"
(class_declaration) @class
(function_declaration) @function
(method_definition) @method
(lexical_declaration (variable_declarator value: (arrow_function)) @arrow_function)
(import_statement) @import
"#;

const TS_DECLARATIONS: &str = r#"
(class_declaration) @class
(function_declaration) @function
(method_definition) @method
(interface_declaration) @interface
(type_alias_declaration) @type
(enum_declaration) @enum
(lexical_declaration (variable_declarator value: (arrow_function)) @arrow_function)
(import_statement) @import
"#;

const JAVA_DECLARATIONS: &str = r#"
(class_declaration) @class
(interface_declaration) @interface
(method_declaration) @method
(enum_declaration) @enum
(import_declaration) @import
(field_declaration) @property
"#;

const JSON_DECLARATIONS: &str = r#"
(document) @module
"#;

/// Maps a capture name from the declaration queries above to the chunk type
/// it represents. Unknown capture names are skipped rather than erroring,
/// so a query can be extended with new captures without touching this list
/// every time... though in practice the two stay in lockstep.
pub fn chunk_type_for_capture(name: &str) -> Option<ChunkType> {
    match name {
        "class" => Some(ChunkType::Class),
        "function" => Some(ChunkType::Function),
        "method" => Some(ChunkType::Method),
        "interface" => Some(ChunkType::Interface),
        "type" => Some(ChunkType::Type),
        "enum" => Some(ChunkType::Enum),
        "arrow_function" => Some(ChunkType::ArrowFunction),
        "import" => Some(ChunkType::Import),
        "property" => Some(ChunkType::Property),
        "module" => Some(ChunkType::Module),
        "namespace" => Some(ChunkType::Namespace),
        _ => None,
    }
}

fn query_text_for(language: SupportedLanguage) -> &'static str {
    match language {
        SupportedLanguage::JavaScript | SupportedLanguage::Jsx => JS_DECLARATIONS,
        SupportedLanguage::TypeScript | SupportedLanguage::Tsx => TS_DECLARATIONS,
        SupportedLanguage::Java => JAVA_DECLARATIONS,
        SupportedLanguage::Json => JSON_DECLARATIONS,
    }
}

type QueryCache = Mutex<HashMap<(SupportedLanguage, &'static str), &'static Query>>;

fn cache() -> &'static QueryCache {
    static CACHE: OnceLock<QueryCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compiles (once) and caches the declaration query for `language`, keyed
/// by `(language, queryText)` so a language whose query text changes (e.g.
/// under future configuration) doesn't collide with a stale compiled query.
pub fn declaration_query(language: SupportedLanguage) -> Result<&'static Query> {
    let text = query_text_for(language);
    let key = (language, text);

    let mut guard = cache().lock().expect("query cache poisoned");
    if let Some(query) = guard.get(&key) {
        return Ok(query);
    }

    let grammar = grammar_for(language);
    let query = Query::new(&grammar, text).map_err(|source| ChunkerError::InvalidQuery {
        language: language.as_str().to_string(),
        source,
    })?;
    let leaked: &'static Query = Box::leak(Box::new(query));
    guard.insert(key, leaked);
    Ok(leaked)
}

fn grammar_for(language: SupportedLanguage) -> tree_sitter::Language {
    match language {
        SupportedLanguage::JavaScript | SupportedLanguage::Jsx => tree_sitter_javascript::LANGUAGE.into(),
        SupportedLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        SupportedLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        SupportedLanguage::Java => tree_sitter_java::LANGUAGE.into(),
        SupportedLanguage::Json => tree_sitter_json::LANGUAGE.into(),
    }
}
