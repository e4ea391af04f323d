//! Observational actions that echo node data into the run report.

use retrofit_types::{ActionResult, Node, Result};

pub(super) fn path(node: &Node) -> ActionResult {
    ActionResult::no_change(node.path.clone())
}

pub(super) fn property(node: &Node, name: &str) -> ActionResult {
    match node.property(name) {
        Some(value) => ActionResult::no_change(format!("{name} = {value}")),
        None => ActionResult::no_change(format!("{name} is not set")),
    }
}

pub(super) fn json(node: &Node) -> Result<ActionResult> {
    Ok(ActionResult::no_change(serde_json::to_string(&node.properties)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrofit_types::{Properties, Value};

    fn sample() -> Node {
        let mut props = Properties::new();
        props.insert("jcr:title".into(), Value::from("Home"));
        props.insert("tags".into(), Value::multi(["a", "b"]));
        Node::new("/content/home", props)
    }

    #[test]
    fn print_path_and_property() {
        assert_eq!(path(&sample()), ActionResult::no_change("/content/home"));
        assert_eq!(
            property(&sample(), "tags"),
            ActionResult::no_change("tags = [a, b]")
        );
        assert_eq!(
            property(&sample(), "missing"),
            ActionResult::no_change("missing is not set")
        );
    }

    #[test]
    fn print_json_of_properties() {
        assert_eq!(
            json(&sample()).unwrap(),
            ActionResult::no_change(r#"{"jcr:title":"Home","tags":["a","b"]}"#)
        );
    }
}
