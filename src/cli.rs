//! CLI interface for learninghub
//!
//! Operator/learner surface over the state core: record progress facts,
//! inspect rollups and reset subsystems. Rendering is plain stdout; the
//! core itself only emits events and return values.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::config::{config_path, data_dir, HubConfig};
use crate::evidence::submit::{DisabledSink, FormEndpoint, RemoteSink};
use crate::evidence::{EvidenceDraft, EvidenceGate, EvidencePrompt, GateOutcome, PromptResponse};
use crate::gamification::NoopGamification;
use crate::proficiency::ProficiencyEngine;
use crate::progress::{LessonCompletionTracker, PracticeTracker, QuizScorer};
use crate::store::FileStorage;
use crate::types::{FixedProfile, Level, LessonKey};

#[derive(Parser)]
#[command(name = "learninghub")]
#[command(about = "Learner progress tracking: lessons, practice, quizzes, proficiency and evidence", long_about = None)]
#[command(version)]
struct Cli {
    /// Learner profile id (overrides the configured one)
    #[arg(short, long, env = "LEARNINGHUB_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark a lesson complete (runs through the evidence gate)
    Complete {
        grade: String,
        module: String,
        lesson: String,
    },
    /// Record a practice exercise answer
    Practice {
        grade: String,
        module: String,
        lesson: String,
        /// Exercise id within the lesson
        exercise: String,
        /// Answer text
        text: String,
        /// How many exercises the lesson has
        #[arg(short, long, default_value = "1")]
        total: usize,
    },
    /// Record a quiz answer for a lesson
    Quiz {
        grade: String,
        module: String,
        lesson: String,
        /// Question index (0-based)
        question: usize,
        /// Whether the answer was correct
        #[arg(long)]
        correct: bool,
        /// How many questions the quiz has
        #[arg(short, long, default_value = "4")]
        total: usize,
    },
    /// Select a proficiency level for a lesson code
    Level {
        /// Lesson code, e.g. V-M1-L01
        lesson_code: String,
        /// minim, standard or performanta
        level: String,
    },
    /// Score a proficiency quiz attempt
    Score {
        /// Lesson code, e.g. V-M1-L01
        lesson_code: String,
        /// Level the quiz was taken at
        level: String,
        score: u32,
        total: u32,
    },
    /// Show lesson-completion and proficiency progress for a module
    Status {
        grade: String,
        module: String,
        /// Module index for proficiency codes (e.g. 1 for V-M1-*)
        #[arg(short = 'i', long)]
        module_index: Option<u32>,
    },
    /// Show curriculum-wide proficiency statistics
    Stats,
    /// Delete all state of one subsystem for the active profile
    Reset {
        /// progress | practice | quiz | proficiency | evidence | all
        subsystem: String,
    },
    /// Show the effective configuration
    Config {
        #[arg(long)]
        show: bool,
    },
}

/// Evidence prompt over stdin; blank "what learned" defers
struct StdinPrompt;

impl EvidencePrompt for StdinPrompt {
    fn collect(&mut self, lesson: &LessonKey) -> PromptResponse {
        println!("Lesson {} requires evidence of your work.", lesson);
        println!("(press Enter on the first question to defer)");

        let what_learned = ask("What did you learn? ");
        if what_learned.trim().is_empty() {
            return PromptResponse::Deferred;
        }
        let what_created = ask("What did you create? ");
        let scratch_url = ask("Project URL (optional): ");

        PromptResponse::Submitted(EvidenceDraft {
            scratch_url: if scratch_url.trim().is_empty() {
                None
            } else {
                Some(scratch_url.trim().to_string())
            },
            what_learned,
            what_created,
        })
    }
}

fn ask(question: &str) -> String {
    print!("{}", question);
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
    line.trim_end_matches(['\n', '\r']).to_string()
}

/// Wired-up subsystem handles for one invocation
struct App {
    backend: Arc<FileStorage>,
    events: Arc<crate::events::EventBus>,
    profiles: Arc<dyn crate::types::ProfileResolver>,
    config: HubConfig,
}

impl App {
    fn new(profile_override: Option<String>) -> Result<Self> {
        let config = HubConfig::load();
        let profile = profile_override.unwrap_or_else(|| config.profile.clone());
        let backend = FileStorage::open(data_dir()?.join("state.json"))?;
        Ok(Self {
            backend,
            events: crate::events::EventBus::new(),
            profiles: FixedProfile::new(&profile),
            config,
        })
    }

    fn lessons(&self) -> LessonCompletionTracker {
        LessonCompletionTracker::new(self.backend.clone(), self.profiles.clone())
    }

    fn engine(&self) -> ProficiencyEngine {
        ProficiencyEngine::new(
            self.backend.clone(),
            self.events.clone(),
            self.profiles.clone(),
            NoopGamification::handle(),
        )
    }

    fn evidence(&self) -> EvidenceGate {
        let sink: Arc<dyn RemoteSink> = match &self.config.submission {
            Some(submission) => Arc::new(FormEndpoint::new(submission)),
            None => Arc::new(DisabledSink),
        };
        EvidenceGate::new(
            self.backend.clone(),
            self.profiles.clone(),
            self.config.evidence.clone(),
            sink,
        )
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let app = App::new(cli.profile)?;

    match cli.command {
        Commands::Complete { grade, module, lesson } => {
            let key = LessonKey::new(&grade, &module, &lesson);
            let tracker = app.lessons();
            let gate = app.evidence();
            let mut prompt = StdinPrompt;

            let mut count = None;
            let outcome = gate.gate(&key, &mut prompt, || {
                count = Some(tracker.complete(&grade, &module, &lesson));
            });
            match outcome {
                GateOutcome::Deferred => {
                    println!("Completion deferred; the lesson stays open.");
                }
                GateOutcome::Invalid(violations) => {
                    println!("Evidence was not accepted:");
                    for violation in violations {
                        println!("  - {}", violation);
                    }
                }
                GateOutcome::Submitted { offline } => {
                    if offline {
                        println!("Evidence saved locally (remote submission unavailable).");
                    } else {
                        println!("Evidence submitted.");
                    }
                    println!("Lesson complete. {} lesson(s) done in {}/{}.", count.unwrap_or(0), grade, module);
                }
                GateOutcome::NotRequired | GateOutcome::AlreadySubmitted => {
                    println!("Lesson complete. {} lesson(s) done in {}/{}.", count.unwrap_or(0), grade, module);
                }
            }
        }

        Commands::Practice { grade, module, lesson, exercise, text, total } => {
            let tracker = PracticeTracker::new(
                app.backend.clone(),
                app.events.clone(),
                app.profiles.clone(),
                NoopGamification::handle(),
                LessonKey::new(&grade, &module, &lesson),
                total,
            );
            tracker.record_answer(&exercise, &text);
            let status = tracker.completion_status();
            println!(
                "Practice: {}/{} completed ({}%), {} XP{}",
                status.completed,
                status.total,
                status.percentage,
                status.xp,
                if status.is_complete { " - lesson practice complete!" } else { "" }
            );
        }

        Commands::Quiz { grade, module, lesson, question, correct, total } => {
            let scorer = QuizScorer::new(
                app.backend.clone(),
                app.events.clone(),
                app.profiles.clone(),
                LessonKey::new(&grade, &module, &lesson),
                total,
            );
            let accepted = scorer.record_answer(question, correct);
            if !accepted {
                println!("Question {} was already answered; first answer counts.", question);
            }
            let status = scorer.status();
            println!(
                "Quiz: {}/{} correct, {}/{} answered{}",
                status.total_correct,
                status.total_questions,
                status.answered,
                status.total_questions,
                if status.is_complete { " - quiz complete" } else { "" }
            );
        }

        Commands::Level { lesson_code, level } => {
            let level: Level = level.parse()?;
            app.engine().set_level(&lesson_code, level);
            println!("Level for {} set to {}.", lesson_code, level);
        }

        Commands::Score { lesson_code, level, score, total } => {
            let level: Level = level.parse()?;
            let outcome = app.engine().record_quiz_score(&lesson_code, level, score, total);
            println!(
                "{} at {}: {:.0}% - {}",
                lesson_code,
                level,
                outcome.percentage * 100.0,
                if outcome.passed { "passed" } else { "not passed" }
            );
            if outcome.xp_earned > 0 {
                println!("  +{} XP", outcome.xp_earned);
            }
            if outcome.suggested_level != level {
                println!("  Suggestion: try level '{}' next.", outcome.suggested_level);
            }
        }

        Commands::Status { grade, module, module_index } => {
            let tracker = app.lessons();
            println!(
                "Lessons completed in {}/{}: {}",
                grade,
                module,
                tracker.completed_count(&grade, &module)
            );
            if let Some(index) = module_index {
                let progress = app.engine().module_progress(&grade, index);
                println!(
                    "Proficiency: {}/{} lessons passed",
                    progress.completed, progress.total
                );
                for (level, count) in &progress.by_level {
                    println!("  {}: {}", level, count);
                }
            }
        }

        Commands::Stats => {
            let stats = app.engine().overall_stats();
            println!("Lessons attempted: {}", stats.total_lessons);
            println!("Lessons passed:    {}", stats.passed_lessons);
            println!("Average score:     {:.0}%", stats.average_score * 100.0);
            println!("Total XP:          {}", stats.total_xp);
        }

        Commands::Reset { subsystem } => {
            let profile = app.profiles.active_profile_id();
            let wipe = |namespace: &'static str| {
                crate::store::PersistentStore::new(app.backend.clone(), namespace).reset(&profile)
            };
            match subsystem.as_str() {
                "progress" => app.lessons().reset(),
                "practice" => wipe(crate::progress::practice::SUBSYSTEM),
                "quiz" => wipe(crate::progress::quiz::SUBSYSTEM),
                "proficiency" => app.engine().reset(),
                "evidence" => app.evidence().reset(),
                "all" => {
                    for namespace in [
                        crate::progress::lessons::SUBSYSTEM,
                        crate::progress::practice::SUBSYSTEM,
                        crate::progress::quiz::SUBSYSTEM,
                        crate::proficiency::SUBSYSTEM,
                        crate::evidence::SUBSYSTEM,
                    ] {
                        wipe(namespace);
                    }
                }
                other => anyhow::bail!(
                    "unknown subsystem '{}' (expected progress, practice, quiz, proficiency, evidence or all)",
                    other
                ),
            }
            println!("Reset '{}' for profile '{}'.", subsystem, profile);
        }

        Commands::Config { show: _ } => {
            println!("Config file: {}", config_path()?.display());
            println!("{}", serde_json::to_string_pretty(&app.config)?);
        }
    }

    Ok(())
}
