//! The bounded plan-act-observe loop.
//!
//! A turn always terminates: the iteration cap and the wall-clock budget
//! both end the loop with an apologetic reply rather than hanging, and a
//! failing tool produces an observation for the next iteration instead of
//! aborting the turn. The runtime itself never returns an error; whatever
//! happens, the user gets a reply and the caller gets a trace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use maitred_core::config::AgentConfig;
use maitred_core::domain::chat::ChatHistory;
use maitred_core::domain::user::User;

use crate::conversation::IntentExtractor;
use crate::llm::{Planner, PlannerStep};
use crate::prompt;
use crate::tools::{today, ToolExecutor};

pub const FALLBACK_REPLY: &str =
    "I'm sorry, I wasn't able to finish that just now. Nothing has been changed on your \
     bookings beyond what I've already confirmed - please try again.";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    IntentAssessed { note: Option<String>, confidence: u8 },
    ToolInvoked { tool: String, arguments: Value },
    Observation { tool: String, observation: Value },
    PlannerFailed { message: String },
    BudgetExhausted { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub trace: Vec<TraceEvent>,
}

pub struct AgentRuntime {
    planner: Arc<dyn Planner>,
    executor: ToolExecutor,
    extractor: IntentExtractor,
    restaurant: String,
    config: AgentConfig,
}

impl AgentRuntime {
    pub fn new(
        planner: Arc<dyn Planner>,
        executor: ToolExecutor,
        restaurant: impl Into<String>,
        config: AgentConfig,
    ) -> Self {
        Self {
            planner,
            executor,
            extractor: IntentExtractor::new(),
            restaurant: restaurant.into(),
            config,
        }
    }

    /// Handle one user message against the given history. Infallible by
    /// construction; the caller is expected to persist both turns whatever
    /// the outcome.
    pub async fn respond(&self, user: &User, history: &ChatHistory, message: &str) -> TurnOutcome {
        let intent = self.extractor.extract(message);
        let system_prompt = prompt::system_prompt(&self.restaurant, today(), &user.profile);
        let deadline = Instant::now() + Duration::from_secs(self.config.turn_budget_secs);

        let mut trace = vec![TraceEvent::IntentAssessed {
            note: intent.hint().map(str::to_string),
            confidence: intent.confidence_score,
        }];
        let mut scratchpad: Vec<(String, String)> = Vec::new();

        for iteration in 0..self.config.max_iterations {
            if Instant::now() >= deadline {
                warn!(user_id = user.id.0, iteration, "turn wall-clock budget exhausted");
                trace.push(TraceEvent::BudgetExhausted {
                    reason: format!("wall clock budget of {}s spent", self.config.turn_budget_secs),
                });
                return TurnOutcome { reply: FALLBACK_REPLY.to_string(), trace };
            }

            let transcript = prompt::transcript(history, message, &intent, &scratchpad);
            let step = match self.planner.next_step(&system_prompt, &transcript).await {
                Ok(step) => step,
                Err(error) => {
                    warn!(user_id = user.id.0, %error, "planner call failed");
                    trace.push(TraceEvent::PlannerFailed { message: error.to_string() });
                    return TurnOutcome { reply: FALLBACK_REPLY.to_string(), trace };
                }
            };

            match step {
                PlannerStep::FinalAnswer(reply) => {
                    info!(user_id = user.id.0, iterations = iteration + 1, "turn completed");
                    return TurnOutcome { reply, trace };
                }
                PlannerStep::Act(call) => {
                    let tool = call.name().to_string();
                    let arguments =
                        serde_json::to_value(&call).unwrap_or_else(|_| json!({ "tool": tool }));
                    trace.push(TraceEvent::ToolInvoked {
                        tool: tool.clone(),
                        arguments: arguments.clone(),
                    });

                    let observation = self.executor.execute(user, call).await;
                    trace.push(TraceEvent::Observation {
                        tool: tool.clone(),
                        observation: observation.clone(),
                    });
                    scratchpad.push((tool, observation.to_string()));
                }
            }
        }

        warn!(user_id = user.id.0, "turn iteration cap reached");
        trace.push(TraceEvent::BudgetExhausted {
            reason: format!("iteration cap of {} reached", self.config.max_iterations),
        });
        TurnOutcome { reply: FALLBACK_REPLY.to_string(), trace }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use maitred_core::config::AgentConfig;
    use maitred_core::domain::chat::ChatHistory;
    use maitred_core::domain::customer::CustomerDetails;
    use maitred_core::domain::user::User;
    use maitred_db::repositories::{
        BookingRepository, InMemoryBookingRepository, InMemoryUserRepository, UserRepository,
    };
    use maitred_gateway::FakeBookingProvider;

    use crate::llm::{PlannerStep, ScriptedPlanner};
    use crate::tools::{today, ToolCall, ToolExecutor};

    use super::{AgentRuntime, TraceEvent, FALLBACK_REPLY};

    struct Harness {
        provider: Arc<FakeBookingProvider>,
        bookings: Arc<InMemoryBookingRepository>,
        runtime: AgentRuntime,
        user: User,
    }

    fn agent_config(max_iterations: u32) -> AgentConfig {
        AgentConfig {
            max_iterations,
            turn_budget_secs: 60,
            max_availability_search_days: 20,
            reject_unknown_cancellation_reason: false,
        }
    }

    async fn harness(steps: Vec<PlannerStep>, max_iterations: u32) -> Harness {
        let provider = Arc::new(FakeBookingProvider::new());
        let bookings = Arc::new(InMemoryBookingRepository::default());
        let users = Arc::new(InMemoryUserRepository::default());
        let mut user = users.create("ann", "hash-a").await.expect("create user");
        user.profile = CustomerDetails {
            first_name: Some("Ann".to_string()),
            surname: Some("Archer".to_string()),
            email: Some("ann@x.com".to_string()),
            ..CustomerDetails::default()
        };
        users.update_profile(user.id, &user.profile).await.expect("seed profile");

        let executor = ToolExecutor::new(
            provider.clone(),
            bookings.clone(),
            users,
            "TheHungryUnicorn",
            agent_config(max_iterations),
        );
        let runtime = AgentRuntime::new(
            Arc::new(ScriptedPlanner::new(steps)),
            executor,
            "TheHungryUnicorn",
            agent_config(max_iterations),
        );
        Harness { provider, bookings, runtime, user }
    }

    #[tokio::test]
    async fn booking_scenario_runs_tool_then_answers() {
        let visit_date = today() + Duration::days(3);
        let steps = vec![
            PlannerStep::Act(ToolCall::CreateBooking {
                visit_date,
                visit_time: "19:00:00".parse().expect("time"),
                party_size: 2,
                channel: None,
                special_requests: None,
                customer: None,
            }),
            PlannerStep::FinalAnswer("All booked - see you then!".to_string()),
        ];
        let harness = harness(steps, 15).await;

        let outcome = harness
            .runtime
            .respond(&harness.user, &ChatHistory::new(), "book a table for 2 in three days at 7pm")
            .await;

        assert_eq!(outcome.reply, "All booked - see you then!");
        assert_eq!(harness.provider.calls().await.create, 1);
        assert_eq!(outcome.trace.len(), 3);
        assert!(matches!(outcome.trace[0], TraceEvent::IntentAssessed { .. }));

        // the booking the tool created is owned by the requesting user
        let TraceEvent::Observation { observation, .. } = &outcome.trace[2] else {
            panic!("third trace entry should be the observation");
        };
        let reference = observation["booking_reference"].as_str().expect("reference");
        let stored =
            harness.bookings.find_by_reference(reference).await.expect("find").expect("saved");
        assert_eq!(stored.owner, harness.user.id);
        assert_eq!(stored.customer_snapshot.first_name.as_deref(), Some("Ann"));
    }

    #[tokio::test]
    async fn tool_failures_become_observations_and_the_turn_still_answers() {
        let steps = vec![
            PlannerStep::Act(ToolCall::CheckAvailability {
                visit_date: today() + Duration::days(1),
                party_size: 25,
                channel: None,
            }),
            PlannerStep::FinalAnswer(
                "We can seat at most 20 guests - shall I check for 20?".to_string(),
            ),
        ];
        let harness = harness(steps, 15).await;

        let outcome = harness
            .runtime
            .respond(&harness.user, &ChatHistory::new(), "table for 25 tomorrow")
            .await;

        assert!(outcome.reply.contains("at most 20"));
        let TraceEvent::Observation { observation, .. } = &outcome.trace[2] else {
            panic!("expected an observation");
        };
        assert_eq!(observation["ok"], false);
        assert_eq!(harness.provider.calls().await.availability, 0);
    }

    #[tokio::test]
    async fn iteration_cap_ends_the_turn_with_an_apology() {
        let step = PlannerStep::Act(ToolCall::ListBookings {});
        let harness = harness(vec![step.clone(), step.clone(), step], 3).await;

        let outcome =
            harness.runtime.respond(&harness.user, &ChatHistory::new(), "loop forever").await;

        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert!(matches!(
            outcome.trace.last(),
            Some(TraceEvent::BudgetExhausted { .. })
        ));
    }

    #[tokio::test]
    async fn planner_failure_yields_the_fallback_reply() {
        let harness = harness(Vec::new(), 15).await;

        let outcome =
            harness.runtime.respond(&harness.user, &ChatHistory::new(), "hello").await;

        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert!(matches!(outcome.trace.last(), Some(TraceEvent::PlannerFailed { .. })));
    }
}
