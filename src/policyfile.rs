//! Parser for the Policyfile grammar: `default_source :TYPE[, URL]` and
//! `cookbook <name>[, <constraint>][, <options>]`.
//!
//! Built on the same shared lexer as [`crate::berksfile`]. Policyfiles have
//! no grouping construct, so every parsed cookbook lands in
//! [`Manifest::cookbooks`].

use crate::manifest::{Arg, Lexer, Manifest, ParseError, Requirement, SourceLocation, TokenCursor, TokenKind, Value};
use crate::version::ConstraintSet;

const STATEMENT_KEYWORDS: &[&str] = &["default_source", "cookbook", "run_list", "name"];

/// Parse Policyfile source text into a neutral [`Manifest`].
///
/// # Errors
///
/// Returns [`ParseError`] on any lexical or grammatical error.
pub fn parse(input: &str) -> Result<Manifest, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut cursor = TokenCursor::new(tokens);
    let mut manifest = Manifest::default();

    while !cursor.is_eof() {
        let TokenKind::Ident(keyword) = cursor.peek_kind().clone() else {
            let tok = cursor.peek();
            return Err(ParseError::new(
                tok.line,
                tok.column,
                format!("expected a statement keyword, found {:?}", tok.kind),
                "",
            ));
        };

        match keyword.as_str() {
            "default_source" => {
                cursor.advance();
                let args = crate::manifest::parse_args(&mut cursor, STATEMENT_KEYWORDS)?;
                manifest.sources.push(parse_default_source(&cursor, &args)?);
            }
            "cookbook" => {
                cursor.advance();
                let args = crate::manifest::parse_args(&mut cursor, STATEMENT_KEYWORDS)?;
                manifest.cookbooks.push(parse_cookbook_stmt(&cursor, &args)?);
            }
            "name" | "run_list" => {
                // Metadata-only statements with no bearing on dependency
                // resolution; consume the argument list and move on.
                cursor.advance();
                let _ = crate::manifest::parse_args(&mut cursor, STATEMENT_KEYWORDS)?;
            }
            other => {
                let tok = cursor.peek();
                return Err(ParseError::new(
                    tok.line,
                    tok.column,
                    format!("unrecognized statement '{other}'"),
                    "",
                ));
            }
        }
    }

    Ok(manifest)
}

/// Map `default_source :TYPE[, URL]` onto a [`SourceLocation`]:
///
/// - `:supermarket` -> supermarket (default URL when none given)
/// - `:chef_server` -> chef_server
/// - `:chef_repo` -> path
/// - `:artifactory` -> supermarket, marked artifactory
fn parse_default_source(cursor: &TokenCursor, args: &[Arg]) -> Result<SourceLocation, ParseError> {
    let tok = cursor.peek();
    let mut kind_symbol = None;
    let mut url = None;
    for arg in args {
        match arg {
            Arg::Positional(Value::Symbol(s)) if kind_symbol.is_none() => {
                kind_symbol = Some(s.clone());
            }
            Arg::Positional(v) => url = Some(v.as_str().to_string()),
            Arg::KeyValue(_, v) => url = Some(v.as_str().to_string()),
        }
    }

    let Some(kind_symbol) = kind_symbol else {
        return Err(ParseError::new(
            tok.line,
            tok.column,
            "default_source requires a source type symbol",
            "",
        ));
    };

    Ok(match kind_symbol.as_str() {
        "supermarket" => SourceLocation::supermarket(
            url.unwrap_or_else(|| crate::DEFAULT_SUPERMARKET_URL.to_string()),
        ),
        "chef_server" => {
            let url = url.ok_or_else(|| {
                ParseError::new(tok.line, tok.column, "chef_server source requires a URL", "")
            })?;
            SourceLocation::chef_server(url)
        }
        "chef_repo" => {
            let path = url.ok_or_else(|| {
                ParseError::new(tok.line, tok.column, "chef_repo source requires a path", "")
            })?;
            SourceLocation::path(path)
        }
        "artifactory" => {
            let url = url.ok_or_else(|| {
                ParseError::new(tok.line, tok.column, "artifactory source requires a URL", "")
            })?;
            SourceLocation::supermarket(url).with_option("artifactory", "true")
        }
        other => {
            return Err(ParseError::new(
                tok.line,
                tok.column,
                format!("unknown default_source type ':{other}'"),
                "",
            ));
        }
    })
}

fn parse_cookbook_stmt(cursor: &TokenCursor, args: &[Arg]) -> Result<Requirement, ParseError> {
    let tok = cursor.peek();
    let mut name = None;
    let mut constraint_str: Option<String> = None;

    for arg in args {
        if let Arg::Positional(v) = arg {
            if name.is_none() {
                name = Some(v.as_str().to_string());
            } else if constraint_str.is_none() {
                constraint_str = Some(v.as_str().to_string());
            }
        }
    }

    let Some(name) = name else {
        return Err(ParseError::new(
            tok.line,
            tok.column,
            "cookbook statement requires a name",
            "",
        ));
    };

    let constraint = ConstraintSet::parse(constraint_str.as_deref().unwrap_or(""))
        .map_err(|e| ParseError::new(tok.line, tok.column, e.to_string(), ""))?;

    Ok(Requirement::new(name, constraint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policyfile_is_empty_manifest() {
        let manifest = parse("").unwrap();
        assert!(manifest.sources.is_empty());
        assert!(manifest.cookbooks.is_empty());
    }

    #[test]
    fn parses_default_source_supermarket() {
        let manifest = parse("default_source :supermarket\n").unwrap();
        assert_eq!(manifest.sources.len(), 1);
        assert_eq!(manifest.sources[0].kind, crate::manifest::SourceKind::Supermarket);
    }

    #[test]
    fn parses_default_source_chef_repo() {
        let manifest = parse("default_source :chef_repo, '/srv/chef-repo/cookbooks'\n").unwrap();
        assert_eq!(manifest.sources[0].kind, crate::manifest::SourceKind::Path);
        assert_eq!(
            manifest.sources[0].local_path.as_deref(),
            Some("/srv/chef-repo/cookbooks")
        );
    }

    #[test]
    fn parses_cookbook_with_constraint() {
        let manifest = parse("cookbook 'nginx', '~> 2.7'\n").unwrap();
        assert_eq!(manifest.cookbooks[0].name, "nginx");
    }

    #[test]
    fn skips_name_and_run_list() {
        let manifest = parse("name 'base'\nrun_list 'nginx::default'\ncookbook 'nginx'\n").unwrap();
        assert_eq!(manifest.cookbooks.len(), 1);
    }
}
