//! Prompt templates for the text-generation service. Pure string
//! formatting; nothing here touches the network.

/// Separator between the confirmation sentence and the specification in
/// the routed generation output.
pub const SPEC_SEPARATOR: &str = "\n\n\n\n\n";

/// Ask the text model to write a code-generation prompt for a new model.
pub fn make_prompt(user_request: &str) -> String {
    format!(
        "Help me write a prompt for a code model to generate OpenSCAD code for the user's request.\n\
         \n\
         Ensure that the prompt includes an instruction to use MCAD or other SCAD libraries built \
         into OpenSCAD as much as possible to make the build more polished; moreover, all items must \
         be attached together and there should not be any random floating bodies.\n\
         \n\
         Also, make sure the prompt specifies that the only return should be OpenSCAD code, with no \
         supporting text or dialogue.\n\
         \n\
         Here's the user's request: {user_request}\n\
         \n\
         Here's an example of a good prompt:\n\
         \n\
         (Give me an OpenSCAD file of a cone:\n\
         \n\
         Make sure the cone is realistic and looks like an actual traffic cone. Refer to at least 10 \
         images online of basic orange traffic cones with two striped horizontal white stripes. The \
         inside must be hollow and the bottom base must be square.\n\
         \n\
         IMPORTANT: the only return should be OpenSCAD code, with no supporting text or dialogue.\n\
         \n\
         IMPORTANT: Make sure to use MCAD libraries built into OpenSCAD whenever appropriate to \
         build this cone. All items must be attached together, there should not be random floating \
         bodies.)\n\
         \n\
         If this specific item is found online, use specific reference OpenSCAD files when possible.\n\
         \n\
         Ensure that the dimensions are small enough (at most they should be <25) so that they can \
         be compiled.\n\
         \n\
         IMPORTANT: MAKE SURE TO FIND REFERENCE IMAGES FIRST BEFORE OUTLINING THE PROMPT."
    )
}

/// Full routed instruction for the generate path: build the refined prompt,
/// then emit confirmation plus specification separated by five newlines.
pub fn generation_instruction(user_request: &str) -> String {
    format!(
        "Generate the instructions according to the following prompt {}, then write a short \
         confirmation sentence that you have generated a CAD file that meets the user's \
         constraints. Output both the confirmation message and the specifications, separated by \
         five newline characters.",
        make_prompt(user_request)
    )
}

/// Routed instruction for the iterate path: judge the old code against the
/// user's fix and produce a revised code-generation prompt.
pub fn revision_instruction(user_fix: &str, old_scad: &str) -> String {
    format!(
        "Here is the user's fix to the old request: {user_fix}\n\
         Here is the generated OpenSCAD code of the original request: {old_scad}\n\
         \n\
         Analyze the OpenSCAD code and see if it meets all the requirements of the user's original \
         request. If it does not, identify the shortcomings and write a revised prompt for a code \
         model that addresses the shortcomings and improves the OpenSCAD code, carrying over the \
         user's fix.\n\
         \n\
         The revised prompt must require that MCAD or other SCAD libraries built into OpenSCAD are \
         used whenever appropriate, that all items are attached together with no random floating \
         bodies, and that the only return is OpenSCAD code with no supporting text or dialogue.\n\
         \n\
         Respond with the revised prompt only."
    )
}

/// One-sentence "generating now" announcement.
pub fn status_prompt(context: &str) -> String {
    format!(
        "based on {context} generate one short sentence that says we are generating the CAD model \
         now. No features, no brands, no fluff."
    )
}

/// Short natural-language description of generated code. The code is
/// truncated so the prompt stays small.
pub fn summary_prompt(scad_code: &str, user_prompt: Option<&str>) -> String {
    let truncated: String = scad_code.chars().take(500).collect();
    let requested = match user_prompt {
        Some(p) if !p.is_empty() => format!("User requested: {p}\n\n"),
        _ => String::new(),
    };
    format!(
        "Based on the following OpenSCAD code, generate ONE SHORT sentence (max 15 words) \
         describing what 3D model was created. Be specific about the shape, dimensions if obvious, \
         and any notable features. Do not mention OpenSCAD or technical details. Keep it natural \
         and conversational.\n\
         \n\
         {requested}OpenSCAD code:\n{truncated}\n\
         \n\
         Generate a brief description:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_prompt_embeds_request_and_constraints() {
        let p = make_prompt("a gaming mouse");
        assert!(p.contains("a gaming mouse"));
        assert!(p.contains("MCAD"));
        assert!(p.contains("floating bodies"));
    }

    #[test]
    fn revision_instruction_carries_fix_and_old_code() {
        let p = revision_instruction("make the handle thicker", "cube(1);");
        assert!(p.contains("make the handle thicker"));
        assert!(p.contains("cube(1);"));
    }

    #[test]
    fn summary_prompt_truncates_code() {
        let long = "x".repeat(2000);
        let p = summary_prompt(&long, None);
        assert!(!p.contains(&"x".repeat(501)));
    }
}
