use std::cell::RefCell;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use classifieds_suite::{ApiError, Normalized, normalize};
use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

/// One recorded create response and what normalizing it must produce.
#[derive(Debug, Deserialize)]
struct NormalizeCase {
    name: String,
    raw: Value,
    /// How the lookup endpoint answers. Absent means it must not be called.
    #[serde(default)]
    lookup: Option<LookupAnswer>,
    expect: Expectation,
}

#[derive(Debug, Deserialize)]
struct LookupAnswer {
    status: u16,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct Expectation {
    outcome: Outcome,
    #[serde(default)]
    lookups: Vec<String>,
    value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Outcome {
    Fetched,
    Direct,
    Fallback,
}

fn main() -> Result<()> {
    let cases_dir = parse_args();
    let cases = load_cases(&cases_dir)?;
    if cases.is_empty() {
        bail!("No normalize cases found under {}", cases_dir.display());
    }

    for case in &cases {
        verify_case(case).with_context(|| format!("case '{}': expectation failed", case.name))?;
    }

    println!(
        "normalize-cases: {} case(s) verified (shape detection + single lookup + fallback)",
        cases.len()
    );

    Ok(())
}

fn parse_args() -> PathBuf {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(flag) if flag == "--cases" => match args.next() {
            Some(path) => PathBuf::from(path),
            None => {
                eprintln!("--cases requires a path argument");
                std::process::exit(2);
            }
        },
        Some(other) => {
            eprintln!(
                "Unexpected argument '{}'. Usage: normalize-cases [--cases <dir>]",
                other
            );
            std::process::exit(2);
        }
        None => PathBuf::from("fixtures/normalize"),
    }
}

fn load_cases(dir: &Path) -> Result<Vec<NormalizeCase>> {
    let mut cases = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(3).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
        {
            let case: NormalizeCase = serde_json::from_slice(&std::fs::read(entry.path())?)
                .with_context(|| format!("failed to parse {}", entry.path().display()))?;
            cases.push(case);
        }
    }
    Ok(cases)
}

fn verify_case(case: &NormalizeCase) -> Result<()> {
    let calls = RefCell::new(Vec::<String>::new());
    let lookup = |id: &str| -> Result<Value, ApiError> {
        calls.borrow_mut().push(id.to_string());
        answer(case.lookup.as_ref(), id)
    };

    let normalized = normalize(case.raw.clone(), &lookup);
    let calls = calls.into_inner();

    let outcome = match &normalized {
        Normalized::Fetched(_) => Outcome::Fetched,
        Normalized::Direct(_) => Outcome::Direct,
        Normalized::Fallback { .. } => Outcome::Fallback,
    };
    if outcome != case.expect.outcome {
        bail!(
            "expected {:?} outcome, got {:?} ({normalized:?})",
            case.expect.outcome,
            outcome
        );
    }
    if case.lookup.is_none() && !calls.is_empty() {
        bail!("lookup must not be called, saw {calls:?}");
    }
    if calls != case.expect.lookups {
        bail!(
            "expected lookups {:?}, saw {:?}",
            case.expect.lookups,
            calls
        );
    }
    let value = normalized.into_value();
    if value != case.expect.value {
        bail!("expected {}, got {}", case.expect.value, value);
    }
    Ok(())
}

fn answer(lookup: Option<&LookupAnswer>, id: &str) -> Result<Value, ApiError> {
    let url = format!("case://api/1/item/{id}");
    match lookup {
        Some(answer) if answer.status == 200 => Ok(answer.body.clone()),
        Some(answer) => Err(ApiError::Status {
            method: "GET",
            url,
            status: answer.status,
            body: answer.body.to_string(),
        }),
        None => Err(ApiError::Transport {
            method: "GET",
            url,
            message: "lookup not expected for this case".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn case(raw: Value, lookup: Option<LookupAnswer>, expect: Expectation) -> NormalizeCase {
        NormalizeCase {
            name: "inline".into(),
            raw,
            lookup,
            expect,
        }
    }

    #[test]
    fn unexpected_lookup_is_reported() {
        let case = case(
            json!({"status": "Saved - abc"}),
            None,
            Expectation {
                outcome: Outcome::Fallback,
                lookups: vec![],
                value: json!({"status": "Saved - abc"}),
            },
        );
        let err = verify_case(&case).unwrap_err();
        assert!(
            err.to_string().contains("must not be called"),
            "expected lookup complaint, got {err}"
        );
    }

    #[test]
    fn fetched_case_passes() {
        let record = json!({"id": "abc", "name": "testItem"});
        let case = case(
            json!({"status": "Saved - abc"}),
            Some(LookupAnswer {
                status: 200,
                body: json!([record.clone()]),
            }),
            Expectation {
                outcome: Outcome::Fetched,
                lookups: vec!["abc".into()],
                value: record,
            },
        );
        verify_case(&case).unwrap();
    }

    #[test]
    fn bundled_cases_all_pass() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("fixtures")
            .join("normalize");
        let cases = load_cases(&dir).unwrap();
        assert!(cases.len() >= 4, "expected bundled cases under {}", dir.display());
        for case in &cases {
            verify_case(case).unwrap_or_else(|err| panic!("{}: {err:#}", case.name));
        }
    }
}
