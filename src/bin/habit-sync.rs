use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Arg, ArgMatches, Command};
use habit_sync::prelude::*;
use habit_sync::{parse_date, HabitClient, HabitId, UserId};
use log::debug;

fn cli() -> Command<'static> {
    let user = Arg::new("user")
        .long("user")
        .short('u')
        .value_name("ID")
        .help("Id of a registered user")
        .takes_value(true)
        .required(true);
    let habit = Arg::new("habit")
        .long("habit")
        .value_name("ID")
        .help("Habit id")
        .takes_value(true)
        .required(true);
    let date = Arg::new("date")
        .long("date")
        .short('d')
        .value_name("YYYY-MM-DD")
        .help("Calendar date, defaults to today")
        .takes_value(true);

    Command::new("habit-sync")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track daily habit completions against a habit service")
        .subcommand_required(true)
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .help("Service root URL, overrides HABIT_API_URL")
                .takes_value(true)
                .global(true),
        )
        .subcommand(
            Command::new("register")
                .about("Create a user")
                .arg(Arg::new("name").long("name").takes_value(true)),
        )
        .subcommand(Command::new("catalogue").about("List every habit the service knows"))
        .subcommand(
            Command::new("new-habit")
                .about("Create a habit")
                .arg(user.clone())
                .arg(Arg::new("title").long("title").takes_value(true).required(true))
                .arg(Arg::new("description").long("description").takes_value(true)),
        )
        .subcommand(
            Command::new("day")
                .about("Show habits and completions for a date")
                .arg(user.clone())
                .arg(date.clone()),
        )
        .subcommand(
            Command::new("toggle")
                .about("Flip completion of a habit for a date")
                .arg(user.clone())
                .arg(habit.clone())
                .arg(date),
        )
        .subcommand(
            Command::new("streak")
                .about("Show the streak of a habit")
                .arg(user)
                .arg(habit),
        )
}

fn id_arg(matches: &ArgMatches, name: &str) -> Result<i64> {
    let raw = matches.value_of(name).unwrap_or_default();
    raw.parse()
        .map_err(|_| Error::config(format!("--{} expects a number, got '{}'", name, raw)))
}

fn date_arg(matches: &ArgMatches) -> Result<Option<NaiveDate>> {
    matches
        .value_of("date")
        .map(|raw| parse_date(raw).map_err(Error::from))
        .transpose()
}

async fn open_day(tracker: &HabitTracker, matches: &ArgMatches) -> Result<()> {
    let user_id: UserId = id_arg(matches, "user")?;
    tracker.resume(user_id).await?;
    if let Some(date) = date_arg(matches)? {
        tracker.change_date(date).await?;
    }
    Ok(())
}

fn print_day(tracker: &HabitTracker) {
    if let Some(date) = tracker.store().selected_date() {
        println!("{}", date);
    }
    for row in tracker.daily_view() {
        println!(
            "[{}] {:>4}  {}  (streak {})",
            if row.completed { "x" } else { " " },
            row.habit.id,
            row.habit.title,
            row.current_streak
        );
    }
}

async fn run(matches: ArgMatches) -> Result<()> {
    let mut options = ClientOptions::from_env()?;
    if let Some(url) = matches.value_of("url") {
        options = options.with_base_url(url);
    }
    debug!("using service at {}", options.base_url);
    let client = HabitClient::new(&options.base_url, options.http_client()?)?;
    let tracker = HabitTracker::new(Arc::new(client));

    match matches.subcommand() {
        Some(("register", sub)) => {
            let user = tracker.sign_in(sub.value_of("name")).await?;
            println!("registered user {}", user.id);
        }
        Some(("catalogue", _)) => {
            for habit in tracker.catalogue().await? {
                println!("{:>4}  {}", habit.id, habit.title);
            }
        }
        Some(("new-habit", sub)) => {
            tracker.resume(id_arg(sub, "user")?).await?;
            let title = sub.value_of("title").unwrap_or_default();
            let habit = tracker.create_habit(title, sub.value_of("description")).await?;
            println!("created habit {}", habit.id);
        }
        Some(("day", sub)) => {
            open_day(&tracker, sub).await?;
            print_day(&tracker);
        }
        Some(("toggle", sub)) => {
            open_day(&tracker, sub).await?;
            let habit_id: HabitId = id_arg(sub, "habit")?;
            match tracker.toggle(habit_id).await? {
                ToggleOutcome::Committed { completed, streak } => println!(
                    "habit {} {} (streak {})",
                    habit_id,
                    if completed { "done" } else { "not done" },
                    streak.map(|s| s.current_streak).unwrap_or_default()
                ),
                ToggleOutcome::RolledBack { .. } => println!("habit {} unchanged, service refused", habit_id),
            }
        }
        Some(("streak", sub)) => {
            let user_id = id_arg(sub, "user")?;
            let habit_id = id_arg(sub, "habit")?;
            let streak = tracker.service().get_streak(user_id, habit_id).await?;
            println!(
                "habit {}: current {}, longest {}",
                habit_id, streak.current_streak, streak.longest_streak
            );
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    if let Err(e) = run(cli().get_matches()).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
