//! Script catalogue.
//!
//! Each builder returns a self-contained expression. Arguments are embedded
//! as JSON literals so selectors never need manual escaping.

use serde_json::json;

use super::types::{Script, ScriptKind};

fn literal(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Clicks the notice dialog's close control if it is visible. Returns whether it clicked.
pub fn dismiss_notice(close_selector: &str) -> Script {
    let source = format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (el && el.offsetParent !== null) {{ el.click(); return true; }}
  return false;
}})()"#,
        sel = literal(&close_selector)
    );
    Script {
        kind: ScriptKind::DismissNotice,
        source,
        args: json!({ "selector": close_selector }),
    }
}

/// Empties an input field. Returns whether the field exists.
pub fn clear_field(selector: &str) -> Script {
    let source = format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  el.value = "";
  return true;
}})()"#,
        sel = literal(&selector)
    );
    Script {
        kind: ScriptKind::ClearField,
        source,
        args: json!({ "selector": selector }),
    }
}

/// Returns the challenge image source (a data URL) or null.
pub fn challenge_image(selector: &str) -> Script {
    let source = format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  return el ? el.src : null;
}})()"#,
        sel = literal(&selector)
    );
    Script {
        kind: ScriptKind::ChallengeImage,
        source,
        args: json!({ "selector": selector }),
    }
}

/// Returns true once the challenge panel has been hidden.
pub fn challenge_passed(panel_selector: &str) -> Script {
    let source = format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  return el.style.display === "none" || window.getComputedStyle(el).display === "none";
}})()"#,
        sel = literal(&panel_selector)
    );
    Script {
        kind: ScriptKind::ChallengePassed,
        source,
        args: json!({ "selector": panel_selector }),
    }
}

/// Lists interactive partitions as `{ "center_x": f64, "partitions": [{ "id", "x", "y" }] }`.
///
/// A shape counts as interactive when hovering it turns the cursor into a pointer.
pub fn enumerate_partitions(shapes_selector: &str, canvas_selector: &str) -> Script {
    let source = format!(
        r#"(() => {{
  const canvas = document.querySelector({canvas});
  const vb = canvas && canvas.viewBox ? canvas.viewBox.baseVal : null;
  const center_x = vb && vb.width ? vb.x + vb.width / 2
    : (canvas ? canvas.getBoundingClientRect().width / 2 : 0);
  const partitions = [];
  document.querySelectorAll({shapes}).forEach((el, index) => {{
    el.dispatchEvent(new MouseEvent("mouseover", {{ bubbles: true, cancelable: true, view: window }}));
    if (window.getComputedStyle(el).cursor !== "pointer") return;
    const box = el.getBBox();
    el.setAttribute("data-curtain-partition", String(index));
    partitions.push({{ id: String(index), x: box.x + box.width / 2, y: box.y + box.height / 2 }});
  }});
  return {{ center_x, partitions }};
}})()"#,
        canvas = literal(&canvas_selector),
        shapes = literal(&shapes_selector)
    );
    Script {
        kind: ScriptKind::EnumeratePartitions,
        source,
        args: json!({ "shapes": shapes_selector, "canvas": canvas_selector }),
    }
}

/// Clicks the partition tagged by [`enumerate_partitions`]. Returns whether it exists.
pub fn select_partition(id: &str) -> Script {
    let marker = format!("[data-curtain-partition=\"{}\"]", id);
    let source = format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  el.dispatchEvent(new MouseEvent("click", {{ bubbles: true, cancelable: true, view: window }}));
  return true;
}})()"#,
        sel = literal(&marker)
    );
    Script {
        kind: ScriptKind::SelectPartition,
        source,
        args: json!({ "id": id }),
    }
}

fn available_units_expr(units_selector: &str, unavailable_fills: &[String]) -> String {
    format!(
        r#"Array.from(document.querySelectorAll({units})).filter(el => {{
    const fill = (el.getAttribute("fill") || "").toUpperCase();
    return !{fills}.map(f => f.toUpperCase()).includes(fill);
  }})"#,
        units = literal(&units_selector),
        fills = literal(&unavailable_fills)
    )
}

/// Counts units whose fill is not one of the unavailable colours.
pub fn count_available_units(units_selector: &str, unavailable_fills: &[String]) -> Script {
    let source = format!(
        "(() => {{\n  return {}.length;\n}})()",
        available_units_expr(units_selector, unavailable_fills)
    );
    Script {
        kind: ScriptKind::CountAvailableUnits,
        source,
        args: json!({ "units": units_selector, "unavailable_fills": unavailable_fills }),
    }
}

/// Clicks the first available unit in document order. Returns whether one was clicked.
pub fn select_first_unit(units_selector: &str, unavailable_fills: &[String]) -> Script {
    let source = format!(
        r#"(() => {{
  const units = {expr};
  if (units.length === 0) return false;
  units[0].dispatchEvent(new MouseEvent("click", {{ bubbles: true, cancelable: true, view: window }}));
  return true;
}})()"#,
        expr = available_units_expr(units_selector, unavailable_fills)
    );
    Script {
        kind: ScriptKind::SelectFirstUnit,
        source,
        args: json!({ "units": units_selector, "unavailable_fills": unavailable_fills }),
    }
}

/// Sets a select control to `value` and fires `change`. Returns whether the option exists.
pub fn select_option(selector: &str, value: &str) -> Script {
    let source = format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  const exists = Array.from(el.options || []).some(o => o.value === {value});
  if (!exists) return false;
  el.value = {value};
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));
  return true;
}})()"#,
        sel = literal(&selector),
        value = literal(&value)
    );
    Script {
        kind: ScriptKind::SelectOption,
        source,
        args: json!({ "selector": selector, "value": value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_are_embedded_as_literals() {
        let script = clear_field("input[name=\"code\"]");
        assert!(script.source.contains(r#""input[name=\"code\"]""#));
        assert_eq!(script.arg_str("selector"), Some("input[name=\"code\"]"));
    }

    #[test]
    fn test_select_partition_targets_marker() {
        let script = select_partition("3");
        assert_eq!(script.kind, ScriptKind::SelectPartition);
        assert!(script.source.contains("data-curtain-partition"));
        assert_eq!(script.arg_str("id"), Some("3"));
    }

    #[test]
    fn test_unit_scripts_carry_fills() {
        let fills = vec!["#DDDDDD".to_string(), "none".to_string()];
        let count = count_available_units("#units rect", &fills);
        assert!(count.source.contains("#DDDDDD"));
        assert_eq!(count.args["unavailable_fills"][1], "none");

        let select = select_first_unit("#units rect", &fills);
        assert_eq!(select.kind, ScriptKind::SelectFirstUnit);
    }

    #[test]
    fn test_select_option_embeds_value() {
        let script = select_option("select[name=bank]", "88");
        assert!(script.source.contains("\"88\""));
        assert_eq!(script.arg_str("value"), Some("88"));
    }
}
