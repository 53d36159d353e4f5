// The system prompt is intentionally empty; all instructions live in the
// user turn alongside the images.
pub const VISION_SYSTEM: &str = include_str!("../data/prompts/vision_system.txt");
pub const VISION_USER: &str = include_str!("../data/prompts/vision_user.txt");

/// Replace `{{key}}` placeholders in a template string.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{{{}}}}}", key), value);
    }
    result
}
