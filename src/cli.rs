use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use crate::core::auth::{AuthContext, Role};
use crate::core::errors::QuizError;
use crate::core::state::AppState;
use crate::schemas::quiz::{GenerateQuizRequest, SourceUpload};
use crate::services::attempt_grading::AnswerSheet;

const USAGE: &str = "\
usage:
  quizzo migrate
  quizzo ingest --file <path> --owner <uuid> [--questions N] [--difficulty easy|medium|hard]
                [--description text] [--time-limit minutes]
  quizzo show <quiz_id>
  quizzo list --owner <uuid> [--limit N]
  quizzo source <quiz_id> --out <path>
  quizzo submit --quiz <quiz_id> --user <uuid> --answers <json file>
  quizzo attempts --user <uuid> [--quiz <quiz_id>] [--limit N]
  quizzo attempt <attempt_id> --user <uuid> [--role learner|creator|admin]";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Migrate,
    Ingest {
        file: PathBuf,
        owner: String,
        question_count: u32,
        difficulty: String,
        description: Option<String>,
        time_limit: Option<i32>,
    },
    Show { quiz_id: String },
    List { owner: String, limit: Option<i64> },
    Source { quiz_id: String, out: PathBuf },
    Submit { quiz_id: String, user: String, answers: PathBuf },
    Attempts { user: String, quiz_id: Option<String>, limit: Option<i64> },
    Attempt { attempt_id: String, user: String, role: Role },
}

impl Command {
    pub(crate) fn needs_state(&self) -> bool {
        !matches!(self, Self::Migrate)
    }
}

pub(crate) fn parse_command(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = args.into_iter();
    let name = args.next().ok_or_else(|| anyhow!("missing command\n{USAGE}"))?;

    let mut positional = Vec::new();
    let mut flags = Vec::new();
    while let Some(arg) = args.next() {
        if let Some(flag) = arg.strip_prefix("--") {
            let value = args.next().ok_or_else(|| anyhow!("--{flag} missing value"))?;
            flags.push((flag.to_string(), value));
        } else {
            positional.push(arg);
        }
    }

    let flag = |key: &str| flags.iter().find(|(name, _)| name == key).map(|(_, value)| value.clone());
    let required = |key: &str| flag(key).ok_or_else(|| anyhow!("--{key} is required\n{USAGE}"));
    let first_positional =
        |what: &str| positional.first().cloned().ok_or_else(|| anyhow!("missing {what}\n{USAGE}"));
    let parse_limit = |value: Option<String>| -> Result<Option<i64>> {
        value.map(|raw| raw.parse::<i64>().with_context(|| format!("invalid --limit {raw}"))).transpose()
    };

    let known: &[&str] = match name.as_str() {
        "migrate" => &[],
        "ingest" => &["file", "owner", "questions", "difficulty", "description", "time-limit"],
        "show" => &[],
        "list" => &["owner", "limit"],
        "source" => &["out"],
        "submit" => &["quiz", "user", "answers"],
        "attempts" => &["user", "quiz", "limit"],
        "attempt" => &["user", "role"],
        other => bail!("unknown command: {other}\n{USAGE}"),
    };
    if let Some((unknown, _)) = flags.iter().find(|(flag, _)| !known.contains(&flag.as_str())) {
        bail!("unknown argument for {name}: --{unknown}");
    }

    let command = match name.as_str() {
        "migrate" => Command::Migrate,
        "ingest" => Command::Ingest {
            file: PathBuf::from(required("file")?),
            owner: required("owner")?,
            question_count: flag("questions")
                .map(|raw| raw.parse::<u32>().with_context(|| format!("invalid --questions {raw}")))
                .transpose()?
                .unwrap_or(5),
            difficulty: flag("difficulty").unwrap_or_else(|| "medium".to_string()),
            description: flag("description"),
            time_limit: flag("time-limit")
                .map(|raw| raw.parse::<i32>().with_context(|| format!("invalid --time-limit {raw}")))
                .transpose()?,
        },
        "show" => Command::Show { quiz_id: first_positional("quiz id")? },
        "list" => Command::List { owner: required("owner")?, limit: parse_limit(flag("limit"))? },
        "source" => Command::Source {
            quiz_id: first_positional("quiz id")?,
            out: PathBuf::from(required("out")?),
        },
        "submit" => Command::Submit {
            quiz_id: required("quiz")?,
            user: required("user")?,
            answers: PathBuf::from(required("answers")?),
        },
        "attempts" => Command::Attempts {
            user: required("user")?,
            quiz_id: flag("quiz"),
            limit: parse_limit(flag("limit"))?,
        },
        _ => Command::Attempt {
            attempt_id: first_positional("attempt id")?,
            user: required("user")?,
            role: flag("role").map(|raw| raw.parse::<Role>()).transpose()?.unwrap_or(Role::Learner),
        },
    };

    Ok(command)
}

/// Runs a command that needs the database and collaborators; prints JSON to stdout.
pub(crate) async fn execute(command: Command, state: &AppState) -> Result<()> {
    match command {
        Command::Migrate => Ok(()),
        Command::Ingest { file, owner, question_count, difficulty, description, time_limit } => {
            let auth = AuthContext::parse(&owner, Role::Creator)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{} has no file name", file.display()))?;

            let ingested = state
                .ingestion()
                .ingest(
                    &auth,
                    SourceUpload { filename, bytes },
                    GenerateQuizRequest { question_count, difficulty, description, time_limit },
                )
                .await
                .map_err(surface)?;
            print_json(&ingested)
        }
        Command::Show { quiz_id } => {
            let quiz = state
                .catalog()
                .fetch_quiz(&quiz_id)
                .await
                .map_err(surface)?
                .ok_or_else(|| anyhow!("quiz {quiz_id} not found"))?;
            print_json(&quiz)
        }
        Command::List { owner, limit } => {
            let quizzes = state.catalog().list_owned(&owner, limit).await.map_err(surface)?;
            print_json(&quizzes)
        }
        Command::Source { quiz_id, out } => {
            let file = state.archive().fetch(&quiz_id).await.map_err(surface)?;
            tokio::fs::write(&out, &file.bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            print_json(&serde_json::json!({
                "quiz_id": quiz_id,
                "path": out.display().to_string(),
                "content_type": file.content_type,
                "size": file.bytes.len(),
            }))
        }
        Command::Submit { quiz_id, user, answers } => {
            let auth = AuthContext::parse(&user, Role::Learner)?;
            let raw = tokio::fs::read_to_string(&answers)
                .await
                .with_context(|| format!("Failed to read {}", answers.display()))?;
            let sheet: AnswerSheet = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid answers JSON in {}", answers.display()))?;

            let attempt = state.grading().submit_attempt(&auth, &quiz_id, &sheet).await.map_err(surface)?;
            print_json(&crate::schemas::quiz::AttemptView::from(attempt))
        }
        Command::Attempts { user, quiz_id, limit } => {
            let auth = AuthContext::parse(&user, Role::Learner)?;
            let history = state
                .review()
                .attempt_history(&auth, quiz_id.as_deref(), limit)
                .await
                .map_err(surface)?;
            print_json(&history)
        }
        Command::Attempt { attempt_id, user, role } => {
            let auth = AuthContext::parse(&user, role)?;
            let detail = state.review().attempt_detail(&auth, &attempt_id).await.map_err(surface)?;
            print_json(&detail)
        }
    }
}

/// Operator-facing errors pass through; internal faults are logged and replaced.
fn surface(err: QuizError) -> anyhow::Error {
    if let Some(raw) = err.raw_response() {
        tracing::error!(raw_response = %raw, "Generation output rejected");
    }
    if err.is_user_visible() {
        return err.into();
    }
    tracing::error!(error = %err, "Internal failure");
    anyhow!("internal error; details are in the log")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
