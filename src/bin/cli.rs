use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::Parser;
use polars::prelude::{AnyValue, DataFrame};
use timetable::calendar::Semester;
use timetable::course::weekday_label;
use timetable::persistence::{self, DynCourseStore, FileCourseStore, StoreBackend};
use timetable::timetable::TimetableError;
use timetable::{Course, CourseType, SlotRange, Timetable, TimetableConfig, WeekRange, WeekView};
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Parser)]
#[command(name = "timetable", about = "Interactive course timetable")]
struct Args {
    /// Path to a TOML config file (default: ./timetable.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Storage backend: text or sqlite
    #[arg(long)]
    backend: Option<StoreBackend>,
    /// Directory holding the text files or the database
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Semester to open
    #[arg(long)]
    semester: Option<String>,
}

fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn cell_text(av: &AnyValue) -> String {
    match av {
        AnyValue::Null => String::new(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::String(s) => s.to_string(),
        _ => av.to_string(),
    }
}

fn render_df_as_text_table(df: &DataFrame) -> String {
    let columns = df.get_columns();
    let col_names: Vec<String> = columns.iter().map(|c| c.name().to_string()).collect();

    let mut cells: Vec<Vec<String>> = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let row = columns
            .iter()
            .map(|col| col.get(row_idx).map(|av| cell_text(&av)).unwrap_or_default())
            .collect();
        cells.push(row);
    }

    let mut widths: Vec<usize> = col_names.iter().map(|n| display_width(n)).collect();
    for row in &cells {
        for (ci, s) in row.iter().enumerate() {
            widths[ci] = widths[ci].max(display_width(s));
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let push_row = |out: &mut String, values: &[String]| {
        out.push('|');
        for (ci, s) in values.iter().enumerate() {
            out.push(' ');
            out.push_str(s);
            out.push_str(&" ".repeat(widths[ci].saturating_sub(display_width(s))));
            out.push_str(" |");
        }
        out.push('\n');
    };

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    push_row(&mut out, &col_names);
    out.push_str(&sep);
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row);
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn print_help() {
    println!(
        "Commands:\n  help                                   Show this help\n  show                                   Show the displayed week as a grid\n  week <n>|next|prev|today               Move the displayed week\n  day <1-7>                              Courses of one weekday in the displayed week\n  list                                   All courses of the semester\n  search <keyword>                       Match name, teacher or location\n  info <id>                              Course details and exam countdown\n  add <day> <slots> <weeks> <name> <location> [teacher] [type] [credits] [--force]\n                                         Add one course (slots like 3 or 3-4, weeks like 1-16)\n  range <day> <lessons> <weeks> <name> <location> [teacher] [--force]\n                                         Add one single-slot course per lesson and week\n  edit <id> <field> <value...> [--force] Fields: name teacher location day slots weeks type credits\n  exam <id> <YYYY-MM-DD|none>            Set or clear the exam date\n  delete <id>                            Delete a course\n  clear                                  Delete every course of the semester\n  slots                                  Show the lesson time table\n  slot <n> <HH:MM> <HH:MM>               Change one lesson's clock times\n  semester show                          Show the active and stored semesters\n  semester set <name> <start> <end>      Create or update a semester and activate it\n  semester use <name>                    Switch to a stored semester\n  export <path>                          Export as CSV (or JSON when the path ends in .json)\n  import <path> [--force]                Import courses from CSV\n  backup <dir>                           Write a timestamped backup\n  quit|exit                              Exit"
    );
}

fn parse_range<T>(input: &str) -> Option<(T, T)>
where
    T: std::str::FromStr + Copy,
{
    match input.split_once('-') {
        Some((start, end)) => Some((start.trim().parse().ok()?, end.trim().parse().ok()?)),
        None => {
            let value = input.trim().parse().ok()?;
            Some((value, value))
        }
    }
}

fn parse_slots(input: &str) -> Option<SlotRange> {
    parse_range::<u8>(input).map(|(start, end)| SlotRange::new(start, end))
}

fn parse_weeks(input: &str) -> Option<WeekRange> {
    parse_range::<u32>(input).map(|(start, end)| WeekRange::new(start, end))
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
}

fn parse_time(input: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(input, "%H:%M").ok()
}

fn report(err: TimetableError) {
    match err {
        TimetableError::Conflict { .. } => {
            println!("Conflict: {err}. Append --force to insert anyway.")
        }
        other => println!("Error: {other}"),
    }
}

fn describe(course: &Course) -> String {
    let mut line = format!(
        "#{} {} lessons {} weeks {} {}",
        course.id.unwrap_or_default(),
        weekday_label(course.weekday),
        course.slots,
        course.weeks,
        course.name
    );
    if !course.location.is_empty() {
        line.push_str(&format!(" @{}", course.location));
    }
    if !course.teacher.is_empty() {
        line.push_str(&format!(" ({})", course.teacher));
    }
    line
}

fn print_courses(courses: &[Course]) {
    if courses.is_empty() {
        println!("No courses.");
        return;
    }
    for course in courses {
        println!("{}", describe(course));
    }
}

struct Session {
    timetable: Timetable<DynCourseStore>,
    view: WeekView,
}

impl Session {
    fn displayed_week(&self) -> u32 {
        self.view.week_number(self.timetable.semester())
    }

    fn show(&self) {
        let week = self.displayed_week();
        println!("{}", self.view.label(self.timetable.semester()));
        match self.timetable.week_grid(week) {
            Ok(df) => println!("{}", render_df_as_text_table(&df)),
            Err(e) => report(e),
        }
    }
}

fn open_timetable(config: &TimetableConfig) -> Timetable<DynCourseStore> {
    let store = match persistence::open_store(&config.storage) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(%err, "could not open course store, continuing with an empty one");
            println!("Warning: could not open storage ({err}); starting empty.");
            Box::new(FileCourseStore::empty(&config.storage.data_dir))
        }
    };
    match Timetable::open(store, &config.semester.current) {
        Ok(timetable) => timetable,
        Err(err) => {
            tracing::error!(%err, "could not read stored state, continuing with an empty one");
            println!("Warning: could not read storage ({err}); starting empty.");
            let store: DynCourseStore = Box::new(FileCourseStore::empty(&config.storage.data_dir));
            Timetable::open(store, &config.semester.current).unwrap_or_else(|err| {
                eprintln!("fatal: {err}");
                std::process::exit(1)
            })
        }
    }
}

fn load_config(args: &Args) -> TimetableConfig {
    let mut config = match TimetableConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            println!("Warning: {err}; using defaults.");
            TimetableConfig::default()
        }
    };
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(semester) = &args.semester {
        config.semester.current = semester.clone();
    }
    config
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config = load_config(&args);
    let timetable = open_timetable(&config);
    let today = chrono::Local::now().date_naive();
    let mut session = Session {
        view: WeekView::containing(today.clamp(
            timetable.semester().start_date,
            timetable.semester().end_date,
        )),
        timetable,
    };

    println!("Course Timetable (CLI) - type 'help' for commands\n");
    session.show();

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let force = input.split_whitespace().any(|p| p == "--force");
        let tokens: Vec<&str> = input.split_whitespace().filter(|p| *p != "--force").collect();
        let Some((&cmd, args)) = tokens.split_first() else {
            continue;
        };

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "show" => session.show(),
            "week" => {
                let semester = session.timetable.semester().clone();
                match args.first().copied() {
                    Some("next") => {
                        if session.view.is_last_week(&semester) {
                            println!("Already at the last week of the semester.");
                            continue;
                        }
                        session.view = session.view.next();
                    }
                    Some("prev") => {
                        if session.view.monday() <= semester.start_date {
                            println!("Already at the first week of the semester.");
                            continue;
                        }
                        session.view = session.view.prev();
                    }
                    Some("today") => session.view = WeekView::today(),
                    Some(n) => match n.parse::<u32>() {
                        Ok(week) if semester.has_week(week) => match WeekView::for_week(&semester, week) {
                            Some(view) => session.view = view,
                            None => continue,
                        },
                        _ => {
                            println!("Week must be between 1 and {}.", semester.total_weeks());
                            continue;
                        }
                    },
                    None => {
                        println!("Usage: week <n>|next|prev|today");
                        continue;
                    }
                }
                session.show();
            }
            "day" => {
                let Some(day) = args.first().and_then(|d| d.parse::<u8>().ok()).filter(|d| (1..=7).contains(d)) else {
                    println!("Usage: day <1-7>");
                    continue;
                };
                match session
                    .timetable
                    .courses_for_week_and_day(session.displayed_week(), day)
                {
                    Ok(courses) => print_courses(&courses),
                    Err(e) => report(e),
                }
            }
            "list" => match session.timetable.courses() {
                Ok(courses) => print_courses(&courses),
                Err(e) => report(e),
            },
            "search" => {
                let keyword = args.join(" ");
                match session.timetable.search(&keyword) {
                    Ok(courses) => print_courses(&courses),
                    Err(e) => report(e),
                }
            }
            "info" => {
                let Some(id) = args.first().and_then(|s| s.parse::<i64>().ok()) else {
                    println!("Usage: info <id>");
                    continue;
                };
                let course = match session.timetable.course(id) {
                    Ok(course) => course,
                    Err(e) => {
                        report(e);
                        continue;
                    }
                };
                println!("{}", describe(&course));
                println!("  type: {}  credits: {}", course.course_type, course.credits);
                if let (Some(start), Some(end)) = (course.start_time, course.end_time) {
                    println!("  time: {}-{}", start.format("%H:%M"), end.format("%H:%M"));
                }
                match session.timetable.exam_countdown(id, chrono::Local::now().date_naive()) {
                    Ok(countdown) => {
                        if let Some(exam) = countdown.exam_date {
                            println!(
                                "  exam: {} ({}), preparation {}%",
                                exam,
                                countdown.status.describe(),
                                countdown.progress_percent
                            );
                        } else {
                            println!("  exam: {}", countdown.status.describe());
                        }
                    }
                    Err(e) => report(e),
                }
            }
            "add" => {
                if args.len() < 5 {
                    println!(
                        "Usage: add <day> <slots> <weeks> <name> <location> [teacher] [type] [credits] [--force]"
                    );
                    continue;
                }
                let Some(day) = args[0].parse::<u8>().ok() else {
                    println!("Invalid day");
                    continue;
                };
                let (Some(slots), Some(weeks)) = (parse_slots(args[1]), parse_weeks(args[2])) else {
                    println!("Invalid slots or weeks (use n or n-m)");
                    continue;
                };
                let mut course = Course::new(args[3], day, slots, weeks);
                course.location = args[4].to_string();
                if let Some(teacher) = args.get(5) {
                    course.teacher = teacher.to_string();
                }
                if let Some(kind) = args.get(6) {
                    course.course_type = CourseType::parse(kind);
                }
                if let Some(credits) = args.get(7) {
                    match credits.parse::<f64>() {
                        Ok(v) => course.credits = v,
                        Err(_) => {
                            println!("Invalid credits");
                            continue;
                        }
                    }
                }
                match session.timetable.add_course(course, force) {
                    Ok(id) => println!("Added course {id}."),
                    Err(e) => report(e),
                }
            }
            "range" => {
                if args.len() < 5 {
                    println!(
                        "Usage: range <day> <lessons> <weeks> <name> <location> [teacher] [--force]"
                    );
                    continue;
                }
                let Some(day) = args[0].parse::<u8>().ok() else {
                    println!("Invalid day");
                    continue;
                };
                let (Some(lessons), Some(weeks)) = (parse_slots(args[1]), parse_weeks(args[2])) else {
                    println!("Invalid lessons or weeks (use n or n-m)");
                    continue;
                };
                let mut template = Course::new(args[3], day, lessons, weeks);
                template.location = args[4].to_string();
                if let Some(teacher) = args.get(5) {
                    template.teacher = teacher.to_string();
                }
                match session
                    .timetable
                    .add_course_range(&template, lessons, weeks, force)
                {
                    Ok(ids) => println!("Added {} courses.", ids.len()),
                    Err(e) => report(e),
                }
            }
            "edit" => {
                if args.len() < 3 {
                    println!("Usage: edit <id> <field> <value...> [--force]");
                    continue;
                }
                let Some(id) = args[0].parse::<i64>().ok() else {
                    println!("Invalid id");
                    continue;
                };
                let mut course = match session.timetable.course(id) {
                    Ok(course) => course,
                    Err(e) => {
                        report(e);
                        continue;
                    }
                };
                let value = args[2..].join(" ");
                let applied = match args[1] {
                    "name" => {
                        course.name = value;
                        true
                    }
                    "teacher" => {
                        course.teacher = value;
                        true
                    }
                    "location" => {
                        course.location = value;
                        true
                    }
                    "day" => value.parse().map(|d| course.weekday = d).is_ok(),
                    "slots" => parse_slots(&value).map(|s| course.slots = s).is_some(),
                    "weeks" => parse_weeks(&value).map(|w| course.weeks = w).is_some(),
                    "type" => {
                        course.course_type = CourseType::parse(&value);
                        true
                    }
                    "credits" => value.parse().map(|c| course.credits = c).is_ok(),
                    other => {
                        println!("Unknown field '{other}'.");
                        continue;
                    }
                };
                if !applied {
                    println!("Invalid value for {}.", args[1]);
                    continue;
                }
                match session.timetable.update_course(course, force) {
                    Ok(()) => println!("Updated course {id}."),
                    Err(e) => report(e),
                }
            }
            "exam" => {
                let (Some(id), Some(value)) = (args.first().and_then(|s| s.parse::<i64>().ok()), args.get(1)) else {
                    println!("Usage: exam <id> <YYYY-MM-DD|none>");
                    continue;
                };
                let exam_date = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    match parse_date(value) {
                        Some(date) => Some(date),
                        None => {
                            println!("Invalid date (YYYY-MM-DD)");
                            continue;
                        }
                    }
                };
                let result = session.timetable.course(id).and_then(|mut course| {
                    course.exam_date = exam_date;
                    session.timetable.update_course(course, true)
                });
                match result {
                    Ok(()) => println!("Exam date updated for course {id}."),
                    Err(e) => report(e),
                }
            }
            "delete" => {
                let Some(id) = args.first().and_then(|s| s.parse::<i64>().ok()) else {
                    println!("Usage: delete <id>");
                    continue;
                };
                match session.timetable.delete_course(id) {
                    Ok(true) => println!("Deleted course {id}."),
                    Ok(false) => println!("Course {id} not found."),
                    Err(e) => report(e),
                }
            }
            "clear" => match session.timetable.clear_all() {
                Ok(removed) => println!("Removed {removed} courses."),
                Err(e) => report(e),
            },
            "slots" => {
                for slot in session.timetable.time_slots().iter() {
                    println!("  {:>2}  {}", slot.index, slot.label());
                }
            }
            "slot" => {
                let parsed = (
                    args.first().and_then(|s| s.parse::<u8>().ok()),
                    args.get(1).and_then(|s| parse_time(s)),
                    args.get(2).and_then(|s| parse_time(s)),
                );
                let (Some(index), Some(start), Some(end)) = parsed else {
                    println!("Usage: slot <n> <HH:MM> <HH:MM>");
                    continue;
                };
                match session.timetable.set_time_slot(index, start, end) {
                    Ok(()) => println!("Lesson {index} set to {}.", session.timetable.time_slots().label(index)),
                    Err(e) => report(e),
                }
            }
            "semester" => match args.first().copied() {
                Some("show") | None => {
                    let current = session.timetable.semester();
                    println!(
                        "Active: {} ({} ~ {}, {} weeks)",
                        current.name,
                        current.start_date,
                        current.end_date,
                        current.total_weeks()
                    );
                    if let Ok(all) = session.timetable.semesters() {
                        for semester in all {
                            println!("  {} {} ~ {}", semester.name, semester.start_date, semester.end_date);
                        }
                    }
                }
                Some("set") => {
                    let parsed = (
                        args.get(1),
                        args.get(2).and_then(|s| parse_date(s)),
                        args.get(3).and_then(|s| parse_date(s)),
                    );
                    let (Some(name), Some(start), Some(end)) = parsed else {
                        println!("Usage: semester set <name> <YYYY-MM-DD> <YYYY-MM-DD>");
                        continue;
                    };
                    let semester = Semester {
                        name: name.to_string(),
                        start_date: start,
                        end_date: end,
                    };
                    match session.timetable.set_semester(semester) {
                        Ok(()) => println!("Semester {name} active."),
                        Err(e) => report(e),
                    }
                }
                Some("use") => {
                    let Some(name) = args.get(1) else {
                        println!("Usage: semester use <name>");
                        continue;
                    };
                    match session.timetable.switch_semester(name) {
                        Ok(()) => {
                            let semester = session.timetable.semester();
                            session.view = WeekView::for_week(semester, 1)
                                .unwrap_or_else(|| WeekView::containing(semester.start_date));
                            println!("Semester {name} active.");
                        }
                        Err(e) => report(e),
                    }
                }
                Some(other) => println!("Unknown semester command '{other}'."),
            },
            "export" => {
                let Some(path) = args.first() else {
                    println!("Usage: export <path>");
                    continue;
                };
                let result = if path.ends_with(".json") {
                    session.timetable.export_json(path)
                } else {
                    session.timetable.export_csv(path)
                };
                match result {
                    Ok(rows) => println!("Exported {rows} courses to {path}."),
                    Err(e) => report(e),
                }
            }
            "import" => {
                let Some(path) = args.first() else {
                    println!("Usage: import <path> [--force]");
                    continue;
                };
                match session.timetable.import_csv(path, force) {
                    Ok(ids) => println!("Imported {} courses from {path}.", ids.len()),
                    Err(e) => report(e),
                }
            }
            "backup" => {
                let Some(dir) = args.first() else {
                    println!("Usage: backup <dir>");
                    continue;
                };
                match session.timetable.backup(dir) {
                    Ok(target) => println!("Backup written to {}.", target.display()),
                    Err(e) => report(e),
                }
            }
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn wide_glyphs_take_two_columns() {
        assert_eq!(display_width("mon"), 3);
        assert_eq!(display_width("高等数学"), 8);
        assert_eq!(display_width("算法 @主楼 101"), 14);
        assert_eq!(display_width("📚"), 2);
        assert_eq!(display_width("e\u{301}"), 1);
    }

    #[test]
    fn table_columns_align_on_display_width() {
        let df = DataFrame::new(vec![
            Series::new("mon".into(), vec!["高数", "ab"]).into_column(),
        ])
        .unwrap();
        let table = render_df_as_text_table(&df);
        let widths: Vec<usize> = table.lines().map(display_width).collect();
        assert!(widths.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
