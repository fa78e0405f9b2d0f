//! Resource commands - list, show and delete records.

use anyhow::Result;
use campus_client::{
    Absence, CampusClient, Classroom, Course, Exam, ExamResult, ListQuery, Parent, Payment,
    Resource, SchoolEvent, Student, Teacher,
};
use clap::{Args, ValueEnum};

use super::Context;

/// Resource collections the console can browse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceKind {
    Students,
    Teachers,
    Parents,
    Classrooms,
    Courses,
    Absences,
    Events,
    Exams,
    Results,
    Payments,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Resource to list
    pub resource: ResourceKind,

    /// Page number (1-based)
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Records per page
    #[arg(short, long, default_value = "20")]
    pub limit: u32,

    /// Free-text filter
    #[arg(short, long)]
    pub search: Option<String>,
}

/// Arguments for `get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Resource type
    pub resource: ResourceKind,

    /// Record ID
    pub id: String,
}

/// Arguments for `delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Resource type
    pub resource: ResourceKind,

    /// Record ID
    pub id: String,
}

/// Calls `$f::<T>(...)` with `T` bound to the record type of `$kind`.
macro_rules! with_resource {
    ($kind:expr, $f:ident, $($arg:expr),*) => {
        match $kind {
            ResourceKind::Students => $f::<Student>($($arg),*).await,
            ResourceKind::Teachers => $f::<Teacher>($($arg),*).await,
            ResourceKind::Parents => $f::<Parent>($($arg),*).await,
            ResourceKind::Classrooms => $f::<Classroom>($($arg),*).await,
            ResourceKind::Courses => $f::<Course>($($arg),*).await,
            ResourceKind::Absences => $f::<Absence>($($arg),*).await,
            ResourceKind::Events => $f::<SchoolEvent>($($arg),*).await,
            ResourceKind::Exams => $f::<Exam>($($arg),*).await,
            ResourceKind::Results => $f::<ExamResult>($($arg),*).await,
            ResourceKind::Payments => $f::<Payment>($($arg),*).await,
        }
    };
}

/// Run `list`.
pub async fn list(args: ListArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let query = ListQuery {
        page: Some(args.page),
        limit: Some(args.limit),
        search: args.search,
    };
    with_resource!(args.resource, list_records, &client, &query, ctx)
}

/// Run `get`.
pub async fn get(args: GetArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    with_resource!(args.resource, show_record, &client, &args.id, ctx)
}

/// Run `delete`.
pub async fn delete(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    with_resource!(args.resource, delete_record, &client, &args.id, ctx)
}

async fn list_records<T: Resource + Row>(
    client: &CampusClient,
    query: &ListQuery,
    ctx: &Context,
) -> Result<()> {
    let page = client.resource::<T>().list_with_query(query).await?;

    if ctx.json_output {
        return ctx.print_json(&page);
    }

    if page.data.is_empty() {
        println!("No {}s found.", T::NAME);
        return Ok(());
    }
    for record in &page.data {
        println!("{:<26} {}", record.id(), record.row());
    }
    println!();
    println!(
        "Page {} of {} ({} total)",
        page.meta.page,
        page.meta.total_pages.max(1),
        page.meta.total
    );
    if page.has_next() {
        println!("  Next: --page {}", page.meta.page + 1);
    }
    Ok(())
}

async fn show_record<T: Resource + Row>(
    client: &CampusClient,
    id: &str,
    ctx: &Context,
) -> Result<()> {
    let record = client.resource::<T>().get(id).await?;

    if ctx.json_output || ctx.verbose {
        return ctx.print_json(&record);
    }
    println!("{} {}", T::NAME, record.id());
    println!("  {}", record.row());
    Ok(())
}

async fn delete_record<T: Resource + Row>(
    client: &CampusClient,
    id: &str,
    ctx: &Context,
) -> Result<()> {
    client.resource::<T>().delete(id).await?;

    if ctx.json_output {
        return ctx.print_json(&serde_json::json!({ "deleted": id, "resource": T::PATH }));
    }
    println!("Deleted {} {}", T::NAME, id);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Table rows
// ─────────────────────────────────────────────────────────────────────────────

/// One-line summary of a record for table output.
pub trait Row {
    fn row(&self) -> String;
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

impl Row for Student {
    fn row(&self) -> String {
        format!(
            "{} {}  class: {}",
            self.first_name,
            self.last_name,
            or_dash(&self.classroom_id)
        )
    }
}

impl Row for Teacher {
    fn row(&self) -> String {
        format!(
            "{} {}  {}",
            self.first_name,
            self.last_name,
            or_dash(&self.speciality)
        )
    }
}

impl Row for Parent {
    fn row(&self) -> String {
        format!(
            "{} {}  {}",
            self.first_name,
            self.last_name,
            or_dash(&self.phone)
        )
    }
}

impl Row for Classroom {
    fn row(&self) -> String {
        match self.capacity {
            Some(capacity) => format!(
                "{}  level: {}  capacity: {}",
                self.name,
                or_dash(&self.level),
                capacity
            ),
            None => format!("{}  level: {}", self.name, or_dash(&self.level)),
        }
    }
}

impl Row for Course {
    fn row(&self) -> String {
        match self.coefficient {
            Some(coefficient) => format!("{}  coef. {}", self.name, coefficient),
            None => self.name.clone(),
        }
    }
}

impl Row for Absence {
    fn row(&self) -> String {
        let justified = if self.justified { "justified" } else { "unjustified" };
        format!("{}  student: {}  {}", self.date, self.student_id, justified)
    }
}

impl Row for SchoolEvent {
    fn row(&self) -> String {
        format!("{}  {}", self.start_date, self.title)
    }
}

impl Row for Exam {
    fn row(&self) -> String {
        format!("{}  {}", self.date, self.title)
    }
}

impl Row for ExamResult {
    fn row(&self) -> String {
        format!(
            "exam: {}  student: {}  score: {}",
            self.exam_id, self.student_id, self.score
        )
    }
}

impl Row for Payment {
    fn row(&self) -> String {
        format!(
            "{:.2}  student: {}  {}",
            self.amount,
            self.student_id,
            or_dash(&self.status)
        )
    }
}
