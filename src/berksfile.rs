//! Parser for the Berksfile grammar: `source`, `metadata`, `cookbook`, and
//! `group :NAME do ... end` statements.
//!
//! Built on the shared lexer in [`crate::manifest`]. An empty Berksfile
//! parses to an empty, valid [`Manifest`] rather than an error, matching the
//! Policyfile grammar's behavior.

use crate::manifest::{
    Arg, Lexer, Manifest, ParseError, Requirement, SourceKind, SourceLocation, TokenCursor,
    TokenKind, Value, parse_args,
};
use crate::version::ConstraintSet;

const STATEMENT_KEYWORDS: &[&str] = &["source", "metadata", "cookbook", "group", "end"];

/// Parse Berksfile source text into a neutral [`Manifest`].
///
/// # Errors
///
/// Returns [`ParseError`] on any lexical or grammatical error.
pub fn parse(input: &str) -> Result<Manifest, ParseError> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut cursor = TokenCursor::new(tokens);
    let mut manifest = Manifest::default();
    parse_statements(&mut cursor, &mut manifest, None)?;
    Ok(manifest)
}

/// Parse a run of statements, stopping at EOF or (inside a group block) at
/// a bare `end`. `current_group` is `Some(name)` while inside a `group`
/// block, so parsed cookbooks are filed under that group rather than
/// top-level.
fn parse_statements(
    cursor: &mut TokenCursor,
    manifest: &mut Manifest,
    current_group: Option<&str>,
) -> Result<(), ParseError> {
    loop {
        if cursor.is_eof() {
            break;
        }
        if current_group.is_some() && cursor.at_ident("end") {
            cursor.advance();
            break;
        }

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
            "source" => {
                cursor.advance();
                let args = parse_args(cursor, STATEMENT_KEYWORDS)?;
                manifest.sources.push(parse_source_stmt(cursor, &args)?);
            }
            "metadata" => {
                cursor.advance();
                // `metadata` takes no arguments; it signals the cookbook
                // depends on its own metadata.rb for name/version/deps.
                manifest.has_metadata = true;
            }
            "group" => {
                cursor.advance();
                let args = parse_args(cursor, &["do"])?;
                let name = args
                    .first()
                    .map(|a| match a {
                        Arg::Positional(v) | Arg::KeyValue(_, v) => v.as_str().to_string(),
                    })
                    .unwrap_or_default();

                // Optional `do`/`end` block wrapper.
                if cursor.at_ident("do") {
                    cursor.advance();
                }

                let mut nested = Manifest::default();
                parse_statements(cursor, &mut nested, Some(&name))?;
                let entry = manifest.groups.entry(name.clone()).or_default();
                entry.extend(nested.cookbooks);
                for (_, reqs) in nested.groups {
                    entry.extend(reqs);
                }
            }
            "cookbook" => {
                cursor.advance();
                let args = parse_args(cursor, STATEMENT_KEYWORDS)?;
                let requirement = parse_cookbook_stmt(cursor, &args)?;
                manifest.cookbooks.push(requirement);
            }
            "end" => {
                // A stray `end` with no enclosing group: treat as an error,
                // since it can only appear closing a `group` block.
                let tok = cursor.peek();
                return Err(ParseError::new(
                    tok.line,
                    tok.column,
                    "unexpected 'end' with no matching 'group do'",
                    "",
                ));
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
    Ok(())
}

fn parse_source_stmt(cursor: &TokenCursor, args: &[Arg]) -> Result<SourceLocation, ParseError> {
    let _ = cursor;
    let mut location = SourceLocation::supermarket(String::new());
    let mut url = None;
    for arg in args {
        match arg {
            Arg::Positional(v) => url = Some(v.as_str().to_string()),
            Arg::KeyValue(key, v) if key == "url" => url = Some(v.as_str().to_string()),
            Arg::KeyValue(key, v) => {
                location = location.with_option(key.clone(), v.as_str().to_string());
            }
        }
    }
    location.url = url.or(Some(crate::DEFAULT_SUPERMARKET_URL.to_string()));
    Ok(location)
}

fn parse_cookbook_stmt(cursor: &TokenCursor, args: &[Arg]) -> Result<Requirement, ParseError> {
    let tok = cursor.peek();
    let mut name = None;
    let mut constraint_str: Option<String> = None;
    let mut options: Vec<(String, Value)> = Vec::new();

    for arg in args {
        match arg {
            Arg::Positional(v) => {
                if name.is_none() {
                    name = Some(v.as_str().to_string());
                } else if constraint_str.is_none() {
                    constraint_str = Some(v.as_str().to_string());
                }
            }
            Arg::KeyValue(key, v) => options.push((key.clone(), v.clone())),
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

    let mut requirement = Requirement::new(name, constraint);
    requirement.source = source_from_options(&options);
    Ok(requirement)
}

/// Map a cookbook statement's keyword options onto a [`SourceLocation`]
/// override, per the option-to-source-variant table:
///
/// - `path:` -> path source
/// - `git:` (+ optional `branch:`/`tag:`/`ref:`) -> git source
/// - `github:` (`user/repo`) -> git source at `https://github.com/<user/repo>.git`
/// - `chef_server:` (+ auth keys) -> chef_server source, creds kept in options
/// - `supermarket:` -> supermarket source with a custom URL
/// - `artifactory:` -> supermarket source, marked artifactory in options
fn source_from_options(options: &[(String, Value)]) -> Option<SourceLocation> {
    let get = |key: &str| {
        options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str().to_string())
    };

    if let Some(path) = get("path") {
        return Some(SourceLocation::path(path));
    }

    if let Some(github) = get("github") {
        let url = format!("https://github.com/{github}.git");
        let mut loc = SourceLocation::git(url);
        loc.git_ref = get("branch").or_else(|| get("tag")).or_else(|| get("ref"));
        return Some(loc);
    }

    if let Some(git_url) = get("git") {
        let mut loc = SourceLocation::git(git_url);
        loc.git_ref = get("branch").or_else(|| get("tag")).or_else(|| get("ref"));
        return Some(loc);
    }

    if let Some(url) = get("chef_server") {
        let mut loc = SourceLocation::chef_server(url);
        for key in ["client_name", "client_key", "signing_key"] {
            if let Some(v) = get(key) {
                loc = loc.with_option(key, v);
            }
        }
        return Some(loc);
    }

    if let Some(url) = get("artifactory") {
        let loc = SourceLocation::supermarket(url).with_option("artifactory", "true");
        return Some(loc);
    }

    if let Some(url) = get("supermarket") {
        return Some(SourceLocation::supermarket(url));
    }

    if options
        .iter()
        .any(|(k, _)| matches!(k.as_str(), "chef_server"))
    {
        return Some(SourceLocation {
            kind: SourceKind::ChefServer,
            url: None,
            git_ref: None,
            local_path: None,
            options: std::collections::HashMap::new(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_berksfile_is_empty_manifest() {
        let manifest = parse("").unwrap();
        assert!(manifest.sources.is_empty());
        assert!(manifest.cookbooks.is_empty());
        assert!(!manifest.has_metadata);
    }

    #[test]
    fn parses_source_and_metadata_and_cookbook() {
        let input = "source 'https://supermarket.chef.io'\nmetadata\ncookbook 'nginx', '~> 2.7'\n";
        let manifest = parse(input).unwrap();
        assert_eq!(manifest.sources.len(), 1);
        assert!(manifest.has_metadata);
        assert_eq!(manifest.cookbooks.len(), 1);
        assert_eq!(manifest.cookbooks[0].name, "nginx");
    }

    #[test]
    fn parses_path_cookbook() {
        let manifest = parse("cookbook 'mylib', path: 'vendor/mylib'\n").unwrap();
        let req = &manifest.cookbooks[0];
        let src = req.source.as_ref().unwrap();
        assert_eq!(src.kind, SourceKind::Path);
        assert_eq!(src.local_path.as_deref(), Some("vendor/mylib"));
    }

    #[test]
    fn parses_git_cookbook_with_branch() {
        let manifest =
            parse("cookbook 'nginx', git: 'https://github.com/sous-chefs/nginx.git', branch: 'main'\n")
                .unwrap();
        let req = &manifest.cookbooks[0];
        let src = req.source.as_ref().unwrap();
        assert_eq!(src.kind, SourceKind::Git);
        assert_eq!(src.git_ref.as_deref(), Some("main"));
    }

    #[test]
    fn parses_github_shorthand() {
        let manifest = parse("cookbook 'nginx', github: 'sous-chefs/nginx'\n").unwrap();
        let req = &manifest.cookbooks[0];
        let src = req.source.as_ref().unwrap();
        assert_eq!(src.kind, SourceKind::Git);
        assert_eq!(
            src.url.as_deref(),
            Some("https://github.com/sous-chefs/nginx.git")
        );
    }

    #[test]
    fn parses_group_block() {
        let input = "group :test do\n  cookbook 'minitest-handler'\nend\n";
        let manifest = parse(input).unwrap();
        assert!(manifest.cookbooks.is_empty());
        assert_eq!(manifest.groups["test"].len(), 1);
        assert_eq!(manifest.groups["test"][0].name, "minitest-handler");
    }

    #[test]
    fn rejects_unknown_statement() {
        let err = parse("frobnicate 'nginx'\n").unwrap_err();
        assert!(err.message.contains("unrecognized statement"));
    }
}
