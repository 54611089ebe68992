//! Field paths into workload documents
//!
//! Mappings locate pod template fields with a small JSONPath subset:
//! an optional leading `$`, dotted field names, `['quoted']` field names,
//! `[N]` indices and `[*]` wildcards. A [`FieldPath`] is parsed once and
//! expanded against a document into concrete [`Location`]s.

use std::fmt;

use serde_json::{Map, Value};

use servicebinding_common::{Error, Result};

/// One parsed path segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Object field
    Field(String),
    /// Array index
    Index(usize),
    /// Every element of an array
    Wildcard,
}

/// One concrete step of a [`Location`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Object field
    Field(String),
    /// Array index
    Index(usize),
}

/// A parsed field path expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path expression
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |message: &str| Error::invalid_path(raw, message);
        let trimmed = raw.trim();
        let mut rest = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let mut segments = Vec::new();

        while let Some(c) = rest.chars().next() {
            match c {
                '.' => {
                    let body = &rest[1..];
                    let end = body.find(['.', '[']).unwrap_or(body.len());
                    if end == 0 {
                        return Err(invalid("empty field name"));
                    }
                    segments.push(Segment::Field(body[..end].to_string()));
                    rest = &body[end..];
                }
                '[' => {
                    let body = &rest[1..];
                    if let Some(quote) = body.chars().next().filter(|q| *q == '\'' || *q == '"') {
                        let inner = &body[1..];
                        let close = inner
                            .find(quote)
                            .ok_or_else(|| invalid("unterminated quoted field name"))?;
                        let after = inner[close + 1..]
                            .strip_prefix(']')
                            .ok_or_else(|| invalid("expected ']' after quoted field name"))?;
                        segments.push(Segment::Field(inner[..close].to_string()));
                        rest = after;
                    } else {
                        let close = body
                            .find(']')
                            .ok_or_else(|| invalid("unterminated subscript"))?;
                        let subscript = body[..close].trim();
                        if subscript == "*" {
                            segments.push(Segment::Wildcard);
                        } else {
                            let index = subscript.parse::<usize>().map_err(|_| {
                                invalid("subscript must be '*', an index, or a quoted name")
                            })?;
                            segments.push(Segment::Index(index));
                        }
                        rest = &body[close + 1..];
                    }
                }
                _ => return Err(invalid("expected '.' or '['")),
            }
        }

        if segments.is_empty() {
            return Err(invalid("path selects no field"));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The expression as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Convert a wildcard-free path into a location
    pub fn to_location(&self) -> Result<Location> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Field(name) => Ok(Step::Field(name.clone())),
                Segment::Index(index) => Ok(Step::Index(*index)),
                Segment::Wildcard => Err(Error::invalid_path(
                    &self.raw,
                    "wildcards are not allowed here",
                )),
            })
            .collect::<Result<Vec<_>>>()
            .map(|steps| Location { steps })
    }

    /// Expand the path against a document.
    ///
    /// Wildcards expand to every element of an existing array and to nothing
    /// when the array is absent. Concrete steps through absent fields still
    /// yield a location, which may then be written.
    pub fn expand(&self, doc: &Value) -> Result<Vec<Location>> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.expand_from(&self.segments, Some(doc), &mut prefix, &mut out)?;
        Ok(out)
    }

    fn expand_from(
        &self,
        segments: &[Segment],
        current: Option<&Value>,
        prefix: &mut Vec<Step>,
        out: &mut Vec<Location>,
    ) -> Result<()> {
        let Some((segment, rest)) = segments.split_first() else {
            out.push(Location {
                steps: prefix.clone(),
            });
            return Ok(());
        };
        let current = current.filter(|v| !v.is_null());

        match segment {
            Segment::Field(name) => {
                let next = match current {
                    None => None,
                    Some(Value::Object(map)) => map.get(name),
                    Some(_) => return Err(self.mismatch(prefix, "an object")),
                };
                prefix.push(Step::Field(name.clone()));
                self.expand_from(rest, next, prefix, out)?;
                prefix.pop();
            }
            Segment::Index(index) => {
                let next = match current {
                    None => None,
                    Some(Value::Array(items)) => items.get(*index),
                    Some(_) => return Err(self.mismatch(prefix, "a list")),
                };
                prefix.push(Step::Index(*index));
                self.expand_from(rest, next, prefix, out)?;
                prefix.pop();
            }
            Segment::Wildcard => match current {
                None => {}
                Some(Value::Array(items)) => {
                    for (index, item) in items.iter().enumerate() {
                        prefix.push(Step::Index(index));
                        self.expand_from(rest, Some(item), prefix, out)?;
                        prefix.pop();
                    }
                }
                Some(_) => return Err(self.mismatch(prefix, "a list")),
            },
        }
        Ok(())
    }

    fn mismatch(&self, prefix: &[Step], expected: &str) -> Error {
        let at = Location {
            steps: prefix.to_vec(),
        };
        Error::view(&self.raw, format!("expected {} at {}", expected, at))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A concrete, wildcard-free position in a document
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    steps: Vec<Step>,
}

impl Location {
    /// Location built from explicit field names
    pub fn fields(names: &[&str]) -> Self {
        Self {
            steps: names.iter().map(|n| Step::Field(n.to_string())).collect(),
        }
    }

    /// Steps of this location
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Location of `relative` resolved against this one
    pub fn join(&self, relative: &Location) -> Location {
        let mut steps = self.steps.clone();
        steps.extend(relative.steps.iter().cloned());
        Location { steps }
    }

    /// Value at this location, if present
    pub fn get<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.steps.iter().try_fold(doc, |current, step| match step {
            Step::Field(name) => current.get(name.as_str()),
            Step::Index(index) => current.get(*index),
        })
    }

    /// Write a value, creating intermediate objects for absent fields.
    ///
    /// Array elements are never created: an index past the end is an error.
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<()> {
        let mut current = doc;
        for step in &self.steps {
            current = match step {
                Step::Field(name) => {
                    if current.is_null() {
                        *current = Value::Object(Map::new());
                    }
                    current
                        .as_object_mut()
                        .ok_or_else(|| Error::view(self.to_string(), "expected an object"))?
                        .entry(name.clone())
                        .or_insert(Value::Null)
                }
                Step::Index(index) => current
                    .as_array_mut()
                    .ok_or_else(|| Error::view(self.to_string(), "expected a list"))?
                    .get_mut(*index)
                    .ok_or_else(|| {
                        Error::view(self.to_string(), format!("index {} out of range", index))
                    })?,
            };
        }
        *current = value;
        Ok(())
    }

    /// Remove the field at this location; absent fields are left alone.
    ///
    /// Objects left empty by the removal are dropped as well. Returns false
    /// when the location ends in an array index, which cannot be removed
    /// without shifting its siblings.
    pub fn remove(&self, doc: &mut Value) -> bool {
        if !matches!(self.steps.last(), Some(Step::Field(_))) {
            return false;
        }
        remove_at(&self.steps, doc);
        true
    }
}

/// Returns whether `current` is an empty object after the removal
fn remove_at(steps: &[Step], current: &mut Value) -> bool {
    match steps {
        [] => return false,
        [Step::Field(name)] => {
            if let Value::Object(map) = current {
                map.remove(name);
            }
        }
        [Step::Index(_)] => return false,
        [step, rest @ ..] => {
            let child = match step {
                Step::Field(name) => current.get_mut(name.as_str()),
                Step::Index(index) => current.get_mut(*index),
            };
            let Some(child) = child else {
                return false;
            };
            if remove_at(rest, child) {
                if let (Step::Field(name), Value::Object(map)) = (step, &mut *current) {
                    map.remove(name);
                }
            }
        }
    }
    current.as_object().is_some_and(|map| map.is_empty())
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("$");
        }
        for step in &self.steps {
            match step {
                Step::Field(name) if name.contains(['.', '[', ']', '/']) => {
                    write!(f, "['{}']", name)?
                }
                Step::Field(name) => write!(f, ".{}", name)?,
                Step::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn field(name: &str) -> Segment {
        Segment::Field(name.to_string())
    }

    #[rstest]
    #[case::dotted(".spec.template.spec.volumes", vec![field("spec"), field("template"), field("spec"), field("volumes")])]
    #[case::dollar("$.spec.volumes", vec![field("spec"), field("volumes")])]
    #[case::wildcard(".spec.containers[*]", vec![field("spec"), field("containers"), Segment::Wildcard])]
    #[case::index(".spec.containers[1].env", vec![field("spec"), field("containers"), Segment::Index(1), field("env")])]
    #[case::quoted(".metadata['annotations'][\"a.b/c\"]", vec![field("metadata"), field("annotations"), field("a.b/c")])]
    fn parses_supported_syntax(#[case] raw: &str, #[case] expected: Vec<Segment>) {
        let path = FieldPath::parse(raw).expect("valid path");
        assert_eq!(path.segments(), expected.as_slice());
        assert_eq!(path.as_str(), raw);
    }

    #[rstest]
    #[case::empty("")]
    #[case::only_root("$")]
    #[case::bare_name("spec.volumes")]
    #[case::empty_field(".spec..volumes")]
    #[case::filter(".spec.containers[?(@.name=='app')]")]
    #[case::unterminated(".spec.containers[0")]
    #[case::unterminated_quote(".metadata['annotations]")]
    fn rejects_unsupported_syntax(#[case] raw: &str) {
        let err = FieldPath::parse(raw).expect_err("invalid path");
        assert!(matches!(err, Error::InvalidPath { .. }), "{err}");
    }

    #[test]
    fn wildcard_expands_existing_elements_only() {
        let doc = json!({"spec": {"containers": [{"name": "a"}, {"name": "b"}]}});
        let path = FieldPath::parse(".spec.containers[*]").expect("path");
        let locations = path.expand(&doc).expect("expand");
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[1].to_string(), ".spec.containers[1]");
        assert_eq!(locations[1].get(&doc), Some(&json!({"name": "b"})));

        let empty = json!({"spec": {}});
        assert!(path.expand(&empty).expect("expand").is_empty());
    }

    #[test]
    fn concrete_path_through_absent_fields_yields_location() {
        let doc = json!({"spec": {"template": null}});
        let path = FieldPath::parse(".spec.template.spec.volumes").expect("path");
        let locations = path.expand(&doc).expect("expand");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].get(&doc), None);
    }

    #[test]
    fn expand_reports_shape_mismatch() {
        let doc = json!({"spec": {"containers": "oops"}});
        let path = FieldPath::parse(".spec.containers[*]").expect("path");
        let err = path.expand(&doc).expect_err("mismatch");
        assert!(matches!(err, Error::View { .. }));
        assert!(err.to_string().contains("expected a list at .spec.containers"));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = json!({"spec": {"template": null}});
        let location = FieldPath::parse(".spec.template.metadata.annotations")
            .and_then(|p| p.to_location())
            .expect("location");
        location
            .set(&mut doc, json!({"k": "v"}))
            .expect("set");
        assert_eq!(doc, json!({"spec": {"template": {"metadata": {"annotations": {"k": "v"}}}}}));
    }

    #[test]
    fn set_does_not_create_array_elements() {
        let mut doc = json!({"items": []});
        let location = FieldPath::parse(".items[0].env")
            .and_then(|p| p.to_location())
            .expect("location");
        assert!(location.set(&mut doc, json!([])).is_err());
    }

    #[test]
    fn remove_prunes_emptied_objects() {
        let mut doc = json!({"spec": {"template": {"metadata": {"annotations": {}}, "spec": {}}}});
        assert!(Location::fields(&["spec", "template", "metadata", "annotations"]).remove(&mut doc));
        assert_eq!(doc, json!({"spec": {"template": {"spec": {}}}}));
    }

    #[test]
    fn remove_drops_field_and_ignores_absent() {
        let mut doc = json!({"spec": {"volumes": [], "keep": 1}});
        assert!(Location::fields(&["spec", "volumes"]).remove(&mut doc));
        assert!(Location::fields(&["spec", "missing", "x"]).remove(&mut doc));
        assert_eq!(doc, json!({"spec": {"keep": 1}}));
    }

    #[test]
    fn wildcard_not_allowed_in_location() {
        let path = FieldPath::parse(".env[*]").expect("path");
        assert!(matches!(path.to_location(), Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn location_join_and_display() {
        let base = FieldPath::parse(".spec.containers[0]")
            .and_then(|p| p.to_location())
            .expect("base");
        let relative = FieldPath::parse("['volumeMounts']")
            .and_then(|p| p.to_location())
            .expect("relative");
        assert_eq!(base.join(&relative).to_string(), ".spec.containers[0].volumeMounts");
        assert_eq!(
            Location::fields(&["metadata", "annotations", "a.b/c"]).to_string(),
            ".metadata.annotations['a.b/c']"
        );
    }
}
