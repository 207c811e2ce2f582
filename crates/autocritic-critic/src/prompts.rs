use crate::{ActionCode, DELIMITER};

/// Prompt templates for the critique and repair exchanges
pub struct CritiquePrompts;

impl CritiquePrompts {
    /// Persona and task outline for the primary exchange
    pub fn system_message() -> String {
        r#"You are an advanced autonomous driving assistant. Your goal is to support drivers in performing safe and efficient driving tasks. You will work through the following steps:

1. **Decision Analysis**: Analyze the driver's decision and assess whether it aligns with safe driving standards and best practices.

2. **Issue Identification**: If a decision may lead to a suboptimal outcome, pinpoint the problem, such as a misunderstanding of traffic rules, an incorrect judgment of the surrounding environment, or a delayed reaction.

3. **Correction and Suggestions**: Provide the correct reasoning process and decision outcome, for instance when and where to slow down or when to change lanes.

4. **Feedback and Recommendations**: Offer immediate feedback that helps the driver improve, such as reminders about blind spots, safe following distances and avoiding distractions.

Through these steps you help drivers complete their driving tasks more safely and efficiently."#
            .to_string()
    }

    /// Human message embedding the scenario, the decision and its evaluation
    pub fn critique_message(scenario: &str, prior_response: &str, evaluation: &str) -> String {
        format!(
            r#"``` Human Message ```
{scenario}
``` Driver's Decision ```
{response}
``` Evaluation Result ```
{evaluation}
The evaluation indicators were calculated as follows, all scores are between 0 and 1:
- Traffic Light Score: If you go through a red light, the score is 0.7. Otherwise it is 1.0.
- Comfort Score: The greater the absolute value of car's acceleration and jerk, the smaller the comfort score.
- Efficiency Score: The lower the car's speed, the smaller the score.
- Speed Limit Score: If the car's speed exceeds the speed limit, the score will be less than 1.0. As the portion of the car that exceeds the speed limit gets larger, the score will be lower.
- Collision Score: When the likelihood of the car colliding with another car is higher, the score is lower. When the score is 1.0, the time in which the car is likely to collide with another car (ttc) is greater than 10 s. When the score is 0.0, the collision has happened.
- Decision Score: Traffic Light Score * (0.2 * Comfort Score + 0.2 * Efficiency Score + 0.2 * Speed Limit Score + 0.4 * Collision Score)

``` Request ```
The driver received a low score for this decision, which means there is a mistake in the driver's reasoning that led to the wrong action.
Carefully check every step of the reasoning in Driver's Decision, find the mistake, and output your corrected version of Driver's Decision.

``` Your Answer ```
Your answer should use the following format:
{d} Analysis of the mistake:
<Your analysis of the mistake in driver's reasoning process>
{d} What should driver do to avoid such errors in the future:
<Your answer>
{d} Corrected version of Driver's Decision:
<Your corrected version of Driver's reasoning process and decision outcome, in the same format as Driver's Decision>
Response to user:{d} <only output one `Action_id` as an int number of your decision, without any action name or explanation. The output decision must be unique and not ambiguous, for example if you decide to decelerate, then output `{decel}`>
"#,
            scenario = scenario,
            response = prior_response,
            evaluation = evaluation,
            d = DELIMITER,
            decel = ActionCode::Decelerate.code(),
        )
    }

    /// Single-message prompt asking the model to restate a valid action id
    pub fn repair_message(corrected_reasoning: &str) -> String {
        format!(
            r#"You are an output checking assistant responsible for checking the output of another agent.

The output you received is: {output}

You should output only the correct int action_id, with no other characters or delimiters.
The valid actions are:
{table}
Your answer must be exactly one action_id from {codes}."#,
            output = corrected_reasoning,
            table = ActionCode::table(),
            codes = ActionCode::code_list(),
        )
    }
}
