use crate::types::GenerationRequest;

/// Render the single prompt sent to the agent.
///
/// The agent plays two roles in sequence: an architect that lays out the file
/// list, then a developer that writes every file. Only the developer's JSON
/// object is expected back.
pub fn render(request: &GenerationRequest) -> String {
    format!(
        "You are a senior software architect and an expert developer working together.\n\
         \n\
         Project request: \"{description}\"\n\
         Tech stack: {technology}\n\
         Difficulty: {difficulty}\n\
         \n\
         Step 1 (architect): design a small, portfolio-worthy project for this request \
         and decide its complete file list, including a README.md and a dependency \
         manifest where the stack has one.\n\
         \n\
         Step 2 (developer): write the FULL content of every file from step 1. \
         Use forward slashes for subdirectories (for example \"src/main.py\").\n\
         \n\
         Reply with ONLY a valid JSON object whose keys are file paths and whose \
         values are the file contents as strings, for example:\n\
         {{\"main.py\": \"import os...\", \"requirements.txt\": \"pandas\"}}\n",
        description = request.enhanced_description(),
        technology = request.technology,
        difficulty = request.difficulty,
    )
}
