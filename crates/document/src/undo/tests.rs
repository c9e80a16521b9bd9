use vellum_primitives::{Position, Region};

use super::{AtomicReplace, UndoEngine, UndoRecord};
use crate::change::DocumentChange;

fn insertion(at: Position, end: Position, text: &str) -> DocumentChange {
	DocumentChange::new(Region::make_empty(at), Region::new(at, end), text.into())
}

fn erasure(region: Region) -> DocumentChange {
	DocumentChange::new(region, Region::make_empty(region.first), String::new())
}

fn top_replace(engine: &UndoEngine) -> (&AtomicReplace, u64, u64) {
	match engine.undo_stack.last().expect("record on stack") {
		UndoRecord::Replace {
			atom,
			revision_before,
			revision_after,
		} => (atom, *revision_before, *revision_after),
		other => panic!("expected a replace record, got {other:?}"),
	}
}

#[test]
fn adjacent_insertions_merge() {
	let mut engine = UndoEngine::default();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	engine.record(
		&insertion(Position::new(0, 3), Position::new(0, 6), "def"),
		String::new(),
		1,
		2,
	);
	assert_eq!(engine.undoable_changes(), 1);
	let (atom, before, after) = top_replace(&engine);
	assert_eq!(atom.region, Region::make_single_line(0, 0..6));
	assert_eq!((before, after), (0, 2));

	// an insertion elsewhere does not merge
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "012"),
		String::new(),
		2,
		3,
	);
	assert_eq!(engine.undoable_changes(), 2);
}

#[test]
fn multi_line_insertion_does_not_merge() {
	let mut engine = UndoEngine::default();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	engine.record(
		&insertion(Position::new(0, 3), Position::new(1, 3), "def\nghi"),
		String::new(),
		1,
		2,
	);
	assert_eq!(engine.undoable_changes(), 2);
}

#[test]
fn erasures_merge_on_either_side() {
	let mut engine = UndoEngine::default();
	// backspace direction: erase [4,5) then [3,4)
	engine.record(
		&erasure(Region::make_single_line(0, 4..5)),
		"e".into(),
		1,
		2,
	);
	engine.record(
		&erasure(Region::make_single_line(0, 3..4)),
		"d".into(),
		2,
		3,
	);
	assert_eq!(engine.undoable_changes(), 1);
	let (atom, before, after) = top_replace(&engine);
	assert_eq!(atom.region, Region::make_empty(Position::new(0, 3)));
	assert_eq!(atom.text, "de");
	assert_eq!((before, after), (1, 3));

	// forward-delete direction: erase [0,1) twice
	engine.record(
		&erasure(Region::make_single_line(0, 0..1)),
		"a".into(),
		3,
		4,
	);
	assert_eq!(engine.undoable_changes(), 2);
	engine.record(
		&erasure(Region::make_single_line(0, 0..1)),
		"b".into(),
		4,
		5,
	);
	assert_eq!(engine.undoable_changes(), 2);
	let (atom, _, _) = top_replace(&engine);
	assert_eq!(atom.text, "ab");
}

#[test]
fn boundary_blocks_merging_and_is_idempotent() {
	let mut engine = UndoEngine::default();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	engine.insert_boundary();
	engine.insert_boundary();
	engine.record(
		&insertion(Position::new(0, 3), Position::new(0, 6), "def"),
		String::new(),
		1,
		2,
	);
	assert_eq!(engine.undoable_changes(), 2);

	// popping discards the single boundary between the records
	assert!(engine.pop_undoable().is_some());
	assert!(engine.pop_undoable().is_some());
	assert!(engine.pop_undoable().is_none());
}

#[test]
fn compound_collects_children_in_fire_order() {
	let mut engine = UndoEngine::default();
	engine.begin_compound();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "def"),
		String::new(),
		1,
		2,
	);
	// the open frame already counts as one undoable change
	assert_eq!(engine.undoable_changes(), 1);
	engine.end_compound().unwrap();
	assert_eq!(engine.undoable_changes(), 1);

	match engine.pop_undoable().unwrap() {
		UndoRecord::Compound {
			children,
			revision_before,
			revision_after,
		} => {
			// the second change is undone first
			assert_eq!(children[0].region, Region::make_single_line(0, 0..3));
			assert_eq!(children.len(), 2);
			assert_eq!((revision_before, revision_after), (0, 2));
		}
		other => panic!("expected compound, got {other:?}"),
	}
}

#[test]
fn nested_compounds_flatten() {
	let mut engine = UndoEngine::default();
	engine.begin_compound();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	engine.begin_compound();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "def"),
		String::new(),
		1,
		2,
	);
	engine.end_compound().unwrap();
	assert!(engine.is_compound_changing());
	engine.end_compound().unwrap();
	assert!(!engine.is_compound_changing());
	assert_eq!(engine.undoable_changes(), 1);
	assert!(matches!(
		engine.pop_undoable(),
		Some(UndoRecord::Compound { .. })
	));
}

#[test]
fn empty_compound_breaks_automatic_composition() {
	let mut engine = UndoEngine::default();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	engine.begin_compound();
	engine.end_compound().unwrap();
	assert_eq!(engine.undoable_changes(), 1);

	// adjacent, but the empty compound broke the run
	engine.record(
		&insertion(Position::new(0, 3), Position::new(0, 6), "def"),
		String::new(),
		1,
		2,
	);
	assert_eq!(engine.undoable_changes(), 2);
}

#[test]
fn ending_without_beginning_is_an_error() {
	let mut engine = UndoEngine::default();
	assert!(engine.end_compound().is_err());
}

#[test]
fn recording_clears_the_redo_stack() {
	let mut engine = UndoEngine::default();
	engine.record(
		&insertion(Position::zero(), Position::new(0, 3), "abc"),
		String::new(),
		0,
		1,
	);
	let record = engine.pop_undoable().unwrap();
	engine.push_redo(record);
	assert_eq!(engine.redoable_changes(), 1);

	engine.record(
		&insertion(Position::zero(), Position::new(0, 1), "x"),
		String::new(),
		1,
		2,
	);
	assert_eq!(engine.redoable_changes(), 0);
}
