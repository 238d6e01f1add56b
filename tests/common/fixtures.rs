use pathmap::Template;
use serde_json::{json, Map, Value};

#[allow(dead_code)]
pub fn planets() -> Value {
    json!({
        "example": {
            "greetings": "Hello",
            "planets": [
                {"planet": "Mars", "residents": "martians"},
                {"planet": "Earth", "residents": "people"},
                {"planet": "Space", "residents": "aliens"},
            ],
            "food": null,
        },
        "cool_object": "Space Shuttle",
    })
}

/// Template touching every node kind.
#[allow(dead_code)]
pub fn everything_template() -> Template {
    Template::map([
        ("greetings", Template::expr("example.greetings")),
        ("from", Template::constant(json!("friends"))),
        ("to", Template::expr("example.planets.<find:planet=Earth>.residents")),
        (
            "neighbors",
            Template::list(
                "example.planets",
                Template::map([
                    ("from", Template::expr("planet")),
                    ("neighbors", Template::expr("residents")),
                ]),
            ),
        ),
        (
            "owning",
            Template::seq([
                Template::expr("cool_object"),
                Template::constant(json!("with")),
                Template::constant(json!("Ion Engine")),
            ]),
        ),
        (
            "munchies",
            Template::list("example.food", Template::map([("item", Template::expr("name"))])),
        ),
    ])
}

#[allow(dead_code)]
pub fn everything_json() -> Value {
    json!({
        "greetings": "example.greetings",
        "from": {"$value": "friends"},
        "to": "example.planets.<find:planet=Earth>.residents",
        "neighbors": {"$list": {
            "root": "example.planets",
            "template": {"from": "planet", "neighbors": "residents"},
        }},
        "owning": ["cool_object", {"$value": "with"}, {"$value": "Ion Engine"}],
        "munchies": {"$list": {"root": "example.food", "template": {"item": "name"}}},
    })
}

#[allow(dead_code)]
pub fn everything_expected() -> Value {
    json!({
        "greetings": "Hello",
        "from": "friends",
        "to": "people",
        "neighbors": [
            {"from": "Mars", "neighbors": "martians"},
            {"from": "Earth", "neighbors": "people"},
            {"from": "Space", "neighbors": "aliens"},
        ],
        "owning": ["Space Shuttle", "with", "Ion Engine"],
        "munchies": [],
    })
}

/// Expressions `foo{i}.<find:value={j}>.foo{k}` chained `depth / 2` times and
/// closed with `.foo`. `values` above `nodes` produces finds with no match.
#[allow(dead_code)]
pub fn generated_config(nodes: usize, depth: usize, values: usize) -> Vec<(String, String)> {
    let segments: Vec<String> = (0..nodes)
        .flat_map(|i| {
            (0..values).flat_map(move |j| {
                (0..nodes).map(move |k| format!("foo{i}.<find:value={j}>.foo{k}"))
            })
        })
        .collect();
    let mut paths: Vec<String> = vec![String::new()];
    for _ in 0..depth / 2 {
        paths = paths
            .iter()
            .flat_map(|prefix| {
                segments.iter().map(move |segment| {
                    if prefix.is_empty() {
                        segment.clone()
                    } else {
                        format!("{prefix}.{segment}")
                    }
                })
            })
            .collect();
    }
    paths
        .into_iter()
        .enumerate()
        .map(|(idx, path)| (format!("{idx:05}"), format!("{path}.foo")))
        .collect()
}

/// Alternates sequence levels (elements tagged with `value`) and mapping levels,
/// ending in `{"foo": "bar"}`.
#[allow(dead_code)]
pub fn generated_data(nodes: usize, depth: usize) -> Value {
    generate_level(nodes, depth, 0)
}

fn generate_level(nodes: usize, depth: usize, iteration: usize) -> Value {
    if iteration == depth {
        return json!({"foo": "bar"});
    }
    let mut output = Map::new();
    for i in 0..nodes {
        let child = if iteration % 2 == 0 {
            Value::Array(
                (0..nodes)
                    .map(|j| {
                        let mut item = generate_level(nodes, depth, iteration + 1);
                        if let Value::Object(fields) = &mut item {
                            fields.insert("value".to_string(), Value::String(j.to_string()));
                        }
                        item
                    })
                    .collect(),
            )
        } else {
            generate_level(nodes, depth, iteration + 1)
        };
        output.insert(format!("foo{i}"), child);
    }
    Value::Object(output)
}
