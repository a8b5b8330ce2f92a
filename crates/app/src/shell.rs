//! Line-oriented practice shell on stdin/stdout.

use std::future;

use practice_core::flashcard::{Judgment, RoundTransition};
use practice_core::model::{LessonId, Modality, VocabularyItem};
use practice_core::questions::{Prompt, Question};
use services::{Answer, AnswerFeedback, OpenedDrill, PracticeEngine, PracticeError, QuestionDrill};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next trimmed line, or `None` at end of input.
    async fn read(&mut self) -> std::io::Result<Option<String>> {
        Ok(self.lines.next_line().await?.map(|l| l.trim().to_owned()))
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

pub async fn show_progress(engine: &PracticeEngine, lesson_id: LessonId) -> Result<(), PracticeError> {
    let items = engine.lesson_vocabulary(lesson_id).await?;
    let summary = engine.get_lesson_progress(lesson_id).await?;
    let progress = engine.get_item_progress_map(lesson_id).await?;

    println!("Lesson {lesson_id}: {} items", items.len());
    println!(
        "  learned {}  mastered {}  mastery {:.0}%  time {}m{:02}s",
        summary.learned_count,
        summary.mastered_count,
        summary.mastery_percent,
        summary.total_time_secs / 60,
        summary.total_time_secs % 60,
    );
    for item in &items {
        match progress.get(&item.id()) {
            Some(p) => println!(
                "  {:<8} {:<9} score {:.2}  seen {:>3}  ok {:>3}  wrong {:>3}",
                item.word(),
                p.status().as_str(),
                p.mastery_score(),
                p.seen_count(),
                p.correct_count(),
                p.wrong_count(),
            ),
            None => println!("  {:<8} new", item.word()),
        }
    }
    Ok(())
}

fn describe(item: &VocabularyItem) {
    println!();
    println!("  {}  {}", item.word(), item.pinyin().unwrap_or(""));
    println!("  {}", item.meaning());
    if let Some(secondary) = item.secondary_meaning() {
        println!("  ({secondary})");
    }
    if !item.word_type().is_empty() {
        println!("  [{}]", item.word_type());
    }
    if let Some(example) = item.example() {
        println!("  e.g. {}  {}", example.sentence, example.pinyin);
        println!("       {}", example.meaning);
    }
}

//
// ─── LOOKUP ────────────────────────────────────────────────────────────────────
//

pub async fn browse(
    engine: &PracticeEngine,
    console: &mut Console,
    lesson_id: LessonId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut browser = engine.open_lookup(lesson_id).await?;
    loop {
        if let Some(item) = browser.current() {
            describe(item);
        }
        let (index, total) = browser.position();
        println!("  [{}/{}] n)ext p)rev q)uit", index + 1, total);

        let Some(line) = console.read().await? else {
            break;
        };
        match line.as_str() {
            "n" | "" => {
                browser.next().await?;
            }
            "p" => {
                browser.previous().await?;
            }
            "q" => break,
            other => match other.parse::<usize>() {
                Ok(n) if n > 0 => {
                    browser.show(n - 1).await?;
                }
                _ => println!("  ?"),
            },
        }
    }
    browser.finish().await?;
    println!("Viewed {} items.", browser.viewed_count());
    Ok(())
}

//
// ─── FLASHCARDS ────────────────────────────────────────────────────────────────
//

pub async fn flashcards(
    engine: &PracticeEngine,
    console: &mut Console,
    lesson_id: LessonId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cards = engine.open_flashcards(lesson_id).await?;
    while let Some(item) = cards.current() {
        let (index, total) = cards.review().position();
        println!();
        println!("  round {}  [{}/{}]  {}", cards.review().round(), index + 1, total, item.word());
        println!("  <enter> flip, q)uit");
        let Some(line) = console.read().await? else {
            break;
        };
        if line == "q" {
            break;
        }
        if let Some(item) = cards.current() {
            describe(item);
        }
        println!("  e)asy h)ard s)kip r)estart q)uit");

        let Some(line) = console.read().await? else {
            break;
        };
        let step = match line.as_str() {
            "e" => cards.judge(Judgment::Easy).await?.step,
            "h" => cards.judge(Judgment::Hard).await?.step,
            "s" => cards.skip()?,
            "r" => {
                cards.restart();
                continue;
            }
            "q" => break,
            _ => continue,
        };
        match step.transition {
            Some(RoundTransition::Review { round, items }) => {
                println!("  Round {round}: {} cards to review again.", items.len());
            }
            Some(RoundTransition::Complete) => println!("  Review complete."),
            None => {}
        }
    }

    let known = cards.review().known().len();
    let unknown = cards.review().unknown().len();
    cards.finish().await?;
    println!("Known {known}, still unknown {unknown}.");
    Ok(())
}

//
// ─── QUESTION DRILLS ───────────────────────────────────────────────────────────
//

enum Input {
    Line(Option<String>),
    TimedOut(u64),
}

pub async fn drill(
    engine: &PracticeEngine,
    console: &mut Console,
    lesson_id: LessonId,
    modality: Modality,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut drill = match engine.open_drill(lesson_id, modality).await? {
        OpenedDrill::Ready(drill) => drill,
        OpenedDrill::NotEnoughVocabulary { eligible, required } => {
            println!("Not enough vocabulary for {modality}: {eligible} usable, {required} needed.");
            return Ok(());
        }
    };

    let mut correct = 0_usize;
    while let Some(question) = drill.current().cloned() {
        ask(&drill, &question);
        let timeout = if drill.is_paused() {
            None
        } else {
            drill.arm_timeout()
        };
        let input = tokio::select! {
            line = console.read() => Input::Line(line?),
            token = async {
                match timeout {
                    Some(rx) => match rx.await {
                        Ok(token) => token,
                        Err(_) => future::pending().await,
                    },
                    None => future::pending().await,
                }
            } => Input::TimedOut(token),
        };

        let feedback = match input {
            Input::TimedOut(token) => {
                println!("  (time's up)");
                drill.time_out(token).await?
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => match line.as_str() {
                ":q" => break,
                ":pause" => {
                    drill.pause();
                    println!("  paused; :resume to continue");
                    continue;
                }
                ":resume" => {
                    drill.resume();
                    continue;
                }
                ":nodraw" => {
                    match drill.report_unrenderable() {
                        Ok(fallback) => println!("  {}", fallback.message),
                        Err(err) => println!("  {err}"),
                    }
                    continue;
                }
                _ => {
                    let answer = parse_answer(&question, &line);
                    match drill.answer(answer).await {
                        Ok(feedback) => Some(feedback),
                        Err(PracticeError::Drill(err)) => {
                            println!("  {err}");
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            },
        };
        drill.leave();

        if let Some(feedback) = feedback {
            correct += usize::from(feedback.is_correct);
            report(&feedback);
        }
    }

    let total = drill.total();
    let session_id = drill.session_id();
    drill.finish().await?;
    let summary = engine.session_report(session_id).await?;
    println!(
        "Done: {correct}/{total} correct, {:.0}% accuracy, {}s.",
        summary.accuracy_percent(),
        summary.duration_secs,
    );
    Ok(())
}

fn ask(drill: &QuestionDrill, question: &Question) {
    println!();
    match &question.prompt {
        Prompt::Text(text) => println!("  {text}"),
        Prompt::Audio(source) => println!("  [play {}]", source.to_storage_string()),
        Prompt::Character(ch) => {
            let meaning = drill
                .item(question.vocabulary_id)
                .map_or("", VocabularyItem::meaning);
            println!("  write {ch}  ({meaning})");
        }
    }
    for (n, option) in question.options.iter().enumerate() {
        println!("    {}) {option}", n + 1);
    }
    println!("  [{} left]  <answer> | <enter> skip | :pause :nodraw :q", drill.remaining());
}

fn parse_answer(question: &Question, line: &str) -> Answer {
    if line.is_empty() {
        return Answer::Skip;
    }
    if question.kind.has_options() {
        let picked = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| question.options.get(i));
        return Answer::Choice(picked.cloned().unwrap_or_else(|| line.to_owned()));
    }
    Answer::Typed(line.to_owned())
}

fn report(feedback: &AnswerFeedback) {
    if feedback.is_correct {
        println!("  correct");
    } else {
        println!("  answer: {}", feedback.question.correct_answer);
    }
    if let Some(progress) = feedback.record.progress() {
        println!(
            "  {} {:.2}",
            progress.status().as_str(),
            progress.mastery_score()
        );
    }
}
