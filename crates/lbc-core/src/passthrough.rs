//! Arguments forwarded verbatim to helm after a literal `--`
//!
//! The installer never rewrites these, but it has to look inside them twice:
//! a `--namespace` given here competes with the installer's own `--namespace`,
//! and value-affecting flags (`--set`, `--values`, ...) must also reach the
//! computed-values render. Both are read with `clap_lex` so that every flag
//! spelling helm accepts (`--flag value`, `--flag=value`, `-n value`, `-nvalue`)
//! is recognised.

use std::ffi::OsStr;

use crate::error::{CoreError, Result};

/// Long flags that change the computed chart values
const VALUE_FLAGS: &[&str] = &["set", "set-string", "set-file", "values"];

/// Short flag equivalent of `--values`
const VALUES_SHORT: char = 'f';

const NAMESPACE_LONG: &str = "namespace";
const NAMESPACE_SHORT: char = 'n';

/// Pre-parsed pass-through arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Passthrough {
    args: Vec<String>,
    namespace: Option<String>,
    value_args: Vec<String>,
}

/// The namespace an operation targets, and whether helm already receives it
/// through the pass-through arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamespace {
    pub name: String,
    pub via_passthrough: bool,
}

impl Passthrough {
    /// Pre-parse the pass-through argument vector
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let raw = clap_lex::RawArgs::new(args.iter());
        let mut cursor = raw.cursor();

        let mut namespace = None;
        let mut value_args = Vec::new();

        while let Some(arg) = raw.next(&mut cursor) {
            if arg.is_escape() {
                break;
            }

            if let Some((Ok(flag), inline)) = arg.to_long() {
                if flag == NAMESPACE_LONG {
                    let value = inline
                        .map(lossy)
                        .or_else(|| raw.next_os(&mut cursor).map(lossy))
                        .ok_or_else(|| missing_value("--namespace"))?;
                    namespace = Some(value);
                } else if VALUE_FLAGS.contains(&flag) {
                    value_args.push(lossy(arg.to_value_os()));
                    if inline.is_none() {
                        if let Some(value) = raw.next_os(&mut cursor) {
                            value_args.push(lossy(value));
                        }
                    }
                }
            } else if let Some(mut shorts) = arg.to_short() {
                match shorts.next_flag() {
                    Some(Ok(NAMESPACE_SHORT)) => {
                        let value = shorts
                            .next_value_os()
                            .map(lossy)
                            .or_else(|| raw.next_os(&mut cursor).map(lossy))
                            .ok_or_else(|| missing_value("-n"))?;
                        namespace = Some(value);
                    }
                    Some(Ok(VALUES_SHORT)) => {
                        value_args.push(lossy(arg.to_value_os()));
                        if shorts.next_value_os().is_none() {
                            if let Some(value) = raw.next_os(&mut cursor) {
                                value_args.push(lossy(value));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(Self {
            args,
            namespace,
            value_args,
        })
    }

    /// All arguments, unchanged
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Namespace given in the pass-through arguments, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Only the arguments that affect computed chart values, in order
    pub fn value_args(&self) -> &[String] {
        &self.value_args
    }

    /// Combine an explicitly given namespace with the pass-through one
    ///
    /// Two different values are a conflict; the operator has to pick one.
    pub fn resolve_namespace(
        &self,
        direct: Option<&str>,
        default: &str,
    ) -> Result<ResolvedNamespace> {
        match (direct, self.namespace()) {
            (Some(direct), Some(passed)) if direct != passed => Err(CoreError::NamespaceConflict {
                direct: direct.to_string(),
                passthrough: passed.to_string(),
            }),
            (_, Some(passed)) => Ok(ResolvedNamespace {
                name: passed.to_string(),
                via_passthrough: true,
            }),
            (Some(direct), None) => Ok(ResolvedNamespace {
                name: direct.to_string(),
                via_passthrough: false,
            }),
            (None, None) => Ok(ResolvedNamespace {
                name: default.to_string(),
                via_passthrough: false,
            }),
        }
    }
}

fn lossy(value: &OsStr) -> String {
    value.to_string_lossy().into_owned()
}

fn missing_value(flag: &str) -> CoreError {
    CoreError::Passthrough {
        message: format!("{} requires a value", flag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Passthrough {
        Passthrough::parse(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_args_are_kept_verbatim() {
        let pt = parse(&["--set", "minikube=true", "--fakearg", "--timeout", "110"]);
        assert_eq!(
            pt.args(),
            &["--set", "minikube=true", "--fakearg", "--timeout", "110"]
        );
        assert_eq!(pt.namespace(), None);
    }

    #[test]
    fn test_namespace_with_equals() {
        let pt = parse(&["--set", "minikube=true", "--fakearg", "--namespace=foobar"]);
        assert_eq!(pt.namespace(), Some("foobar"));
    }

    #[test]
    fn test_namespace_separate_value() {
        let pt = parse(&["--fakearg", "--namespace", "foobar"]);
        assert_eq!(pt.namespace(), Some("foobar"));
    }

    #[test]
    fn test_namespace_short_flag() {
        assert_eq!(parse(&["-n", "foo"]).namespace(), Some("foo"));
        assert_eq!(parse(&["-nfoo"]).namespace(), Some("foo"));
    }

    #[test]
    fn test_namespace_without_value_fails() {
        let err = Passthrough::parse(["--namespace"]).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_value_args_pruned_in_order() {
        let pt = parse(&[
            "--unsupported",
            "--set",
            "a=1,b=2",
            "--set=c=3",
            "--values",
            "a.yml,b.yml",
            "--values=c.yml",
            "-f",
            "d.yml",
            "--set-file",
            "e=e.yml,f=f.yml",
            "--set-file=g=g.yml",
            "--set-string",
            "h=4",
            "--set-string=h=4",
            "--wait",
        ]);

        assert_eq!(
            pt.value_args(),
            &[
                "--set",
                "a=1,b=2",
                "--set=c=3",
                "--values",
                "a.yml,b.yml",
                "--values=c.yml",
                "-f",
                "d.yml",
                "--set-file",
                "e=e.yml,f=f.yml",
                "--set-file=g=g.yml",
                "--set-string",
                "h=4",
                "--set-string=h=4",
            ]
        );
    }

    #[test]
    fn test_resolve_namespace_conflict() {
        let pt = parse(&["--namespace", "bar"]);
        let err = pt.resolve_namespace(Some("foo"), "lightbend").unwrap_err();
        assert!(matches!(err, CoreError::NamespaceConflict { .. }));
    }

    #[test]
    fn test_resolve_namespace_same_value_is_fine() {
        let pt = parse(&["--namespace", "foo"]);
        let ns = pt.resolve_namespace(Some("foo"), "lightbend").unwrap();
        assert_eq!(ns.name, "foo");
        assert!(ns.via_passthrough);
    }

    #[test]
    fn test_resolve_namespace_precedence() {
        let none = Passthrough::default();
        assert_eq!(
            none.resolve_namespace(None, "lightbend").unwrap(),
            ResolvedNamespace {
                name: "lightbend".to_string(),
                via_passthrough: false
            }
        );
        assert_eq!(
            none.resolve_namespace(Some("monitoring"), "lightbend")
                .unwrap()
                .name,
            "monitoring"
        );

        let passed = parse(&["--namespace=foobar"]);
        let ns = passed.resolve_namespace(None, "lightbend").unwrap();
        assert_eq!(ns.name, "foobar");
        assert!(ns.via_passthrough);
    }
}
