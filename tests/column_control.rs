use std::cell::RefCell;
use std::rc::Rc;

use colctl::column_control::{ClassName, ColumnControl, ControlOptions, Lifecycle, Target};
use colctl::content::{ContentDescriptor, ContentRegistry, Options, PluginConfig, PluginDescriptor};
use colctl::control::{Control, ControlRef, Destroy, DestroyRef};
use colctl::domain::CCError;
use colctl::grid::{Grid, GridOptions};
use colctl::host::{Host, Section};
use colctl::search_input::{Operator, SearchInputBuilder};
use ratatui::buffer::Buffer;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use serde_json::{Value, json};

thread_local! {
    static DESTROYED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

struct Probe {
    name: String,
}

impl Control for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn render(&self, area: Rect, buf: &mut Buffer, _focused: bool) {
        buf.set_stringn(area.x, area.y, &self.name, area.width as usize, Style::default());
    }

    fn handle_key(&self, _key: KeyEvent) -> bool {
        false
    }
}

impl Destroy for Probe {
    fn destroy(&self) {
        DESTROYED.with(|d| d.borrow_mut().push(self.name.clone()));
    }
}

fn probe_init(ctx: &ColumnControl, config: &PluginConfig) -> Result<ControlRef, CCError> {
    let name = config
        .options
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("probe")
        .to_string();
    let probe = Rc::new(Probe { name });
    ctx.destroy_add(probe.clone());
    Ok(probe)
}

fn big_probe(_ctx: &ColumnControl, config: &Options) -> ContentDescriptor {
    ContentDescriptor::extended("probe", config.clone())
}

fn ping(_ctx: &ColumnControl, _config: &Options) -> ContentDescriptor {
    ContentDescriptor::named("pong")
}

fn pong(_ctx: &ColumnControl, _config: &Options) -> ContentDescriptor {
    ContentDescriptor::named("ping")
}

fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

fn registry() -> Rc<ContentRegistry> {
    Rc::new(
        ContentRegistry::builtin()
            .register(
                "probe",
                PluginDescriptor::terminal(options(json!({"name": "probe", "size": 1})), probe_init),
            )
            .register("bigProbe", PluginDescriptor::alias(options(json!({"size": 2})), big_probe))
            .register("ping", PluginDescriptor::alias(Options::new(), ping))
            .register("pong", PluginDescriptor::alias(Options::new(), pong)),
    )
}

fn cities(columns: usize, options: GridOptions) -> Rc<Grid> {
    let data = vec!["Oslo", "Lima", "Oslo", "", "Lisbon"];
    Rc::new(Grid::new(
        (0..columns)
            .map(|idx| {
                (
                    format!("C{idx}"),
                    data.iter().map(|v| v.to_string()).collect::<Vec<String>>(),
                )
            })
            .collect(),
        options,
    ))
}

fn content(value: Value) -> ControlOptions {
    ControlOptions::default().content(serde_json::from_value(value).unwrap())
}

fn mount(grid: &Rc<Grid>, idx: usize, opts: ControlOptions) -> Result<ColumnControl, CCError> {
    let host: Rc<dyn Host> = grid.clone();
    ColumnControl::new(host, registry(), idx, opts)
}

fn press(control: &ColumnControl, code: KeyCode) {
    let key = KeyEvent::new(code, KeyModifiers::NONE);
    control.wrapper().unwrap().handle_key(key);
}

/// Erase the pending text and search for `term`, keeping the operator.
fn retype(control: &ColumnControl, term: &str) {
    for _ in 0..16 {
        press(control, KeyCode::Backspace);
    }
    search_for(control, term);
}

fn search_for(control: &ColumnControl, term: &str) {
    for c in term.chars() {
        press(control, KeyCode::Char(c));
    }
    press(control, KeyCode::Enter);
}

#[test]
fn resolve_merges_defaults_for_every_descriptor_shape() {
    let grid = cities(1, GridOptions::default());
    let control = mount(&grid, 0, ControlOptions::default()).unwrap();
    assert_eq!(control.state(), Lifecycle::Bound);

    let named = control.resolve(&ContentDescriptor::named("probe")).unwrap();
    assert_eq!(named.kind, "probe");
    assert_eq!(Value::Object(named.config), json!({"name": "probe", "size": 1}));

    let extended = control
        .resolve(&ContentDescriptor::extended(
            "probe",
            options(json!({"size": 5, "extra": true})),
        ))
        .unwrap();
    assert_eq!(
        Value::Object(extended.config),
        json!({"name": "probe", "size": 5, "extra": true})
    );

    let sequence = control
        .resolve(&ContentDescriptor::Sequence(vec![ContentDescriptor::named("probe")]))
        .unwrap();
    assert_eq!(sequence.kind, "dropdown");
    assert_eq!(sequence.config["content"], json!(["probe"]));
    assert_eq!(sequence.config["icon"], json!("menu"));

    let aliased = control.resolve(&ContentDescriptor::named("bigProbe")).unwrap();
    assert_eq!(aliased.kind, "probe");
    assert!(aliased.init().is_some());
    assert_eq!(Value::Object(aliased.config), json!({"name": "probe", "size": 2}));
}

#[test]
fn unknown_content_types_are_errors() {
    let grid = cities(1, GridOptions::default());
    let control = mount(&grid, 0, ControlOptions::default()).unwrap();
    assert!(matches!(
        control.resolve(&ContentDescriptor::named("colVis")),
        Err(CCError::UnknownContentType(name)) if name == "colVis"
    ));
}

#[test]
fn alias_cycles_are_reported() {
    let grid = cities(1, GridOptions::default());
    let control = mount(&grid, 0, ControlOptions::default()).unwrap();
    match control.resolve(&ContentDescriptor::named("ping")) {
        Err(CCError::AliasCycle(chain)) => assert_eq!(chain, vec!["ping", "pong", "ping"]),
        other => panic!("Expected a cycle, got {other:?}"),
    }
}

#[test]
fn search_dropdown_resolves_to_a_dropdown_holding_a_search() {
    let grid = cities(1, GridOptions::default());
    let control = mount(&grid, 0, ControlOptions::default()).unwrap();
    let resolved = control
        .resolve(&ContentDescriptor::named("searchDropdown"))
        .unwrap();
    assert_eq!(resolved.kind, "dropdown");
    assert_eq!(resolved.config["icon"], json!("search"));
    assert_eq!(resolved.config["content"][0]["extend"], json!("search"));
    assert_eq!(resolved.config["content"][0]["clear"], json!(true));
}

#[test]
fn failed_initialisation_leaves_no_trace() {
    let grid = cities(1, GridOptions::default());
    let result = mount(&grid, 0, content(json!(["searchText", "colVis"])));
    assert!(matches!(result, Err(CCError::UnknownContentType(_))));

    let cell = grid.cell(0, Section::Header, 0).unwrap();
    assert!(cell.borrow().wrappers().is_empty());
    assert_eq!(grid.listener_count(), 0);
}

#[test]
fn state_round_trips_through_a_restart() {
    let operators = || {
        vec![
            Operator::new("Contains", "contains"),
            Operator::new("Equals", "equal"),
        ]
    };
    let grid = cities(2, GridOptions::default());
    let input = SearchInputBuilder::new()
        .operators(operators())
        .build(grid.clone(), 1)
        .unwrap();
    input.set_value("equal", "Oslo");
    let state = grid.save_state();
    assert_eq!(
        state["columnControl"]["1"]["searchInput"],
        json!({"logic": "equal", "type": "text", "value": "Oslo"})
    );

    let restarted = cities(2, GridOptions::default().state(state));
    let restored = SearchInputBuilder::new()
        .operators(operators())
        .build(restarted, 1)
        .unwrap();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    restored.register_filter_callback(move |op, term, loading| {
        sink.borrow_mut().push((op.to_string(), term.to_string(), loading))
    });
    assert_eq!(
        *calls.borrow(),
        vec![("equal".to_string(), "Oslo".to_string(), true)]
    );
    assert!(!restored.is_loading());
    assert!(restored.is_active());
}

#[test]
fn server_payload_carries_transformed_value_and_extra_data() {
    let grid = cities(2, GridOptions::default().server_side(true));
    let input = SearchInputBuilder::new()
        .operators(vec![Operator::new("Equals", "equal")])
        .value_transform(|v| v.to_uppercase())
        .extra_server_data(options(json!({"foo": 1})))
        .build(grid.clone(), 1)
        .unwrap();
    input.set_value("equal", "abc");

    let request = grid.build_request();
    assert_eq!(
        request["columns"][1]["columnControl"]["search"],
        json!({"value": "ABC", "logic": "equal", "type": "text", "foo": 1})
    );
    assert!(request["columns"][0].get("columnControl").is_none());
    assert_eq!(input.term(), "abc");
}

#[test]
fn reordering_follows_the_column() {
    let grid = cities(6, GridOptions::default().server_side(true));
    let control = mount(&grid, 2, content(json!(["searchText"]))).unwrap();

    assert!(grid.move_column(2, 5));
    assert_eq!(control.idx(), 5);
    assert_eq!(control.original_idx(), 2);

    search_for(&control, "lima");
    let request = grid.last_request().unwrap();
    assert_eq!(request["columns"][5]["columnControl"]["search"]["value"], json!("lima"));
    assert!(request["columns"][2].get("columnControl").is_none());

    let state = grid.save_state();
    assert_eq!(state["columnControl"]["5"]["searchInput"]["value"], json!("lima"));
    assert!(state["columnControl"].get("2").is_none());

    grid.search_clear(2);
    assert_eq!(grid.save_state()["columnControl"]["5"]["searchInput"]["value"], json!("lima"));
    grid.search_clear(5);
    assert_eq!(grid.save_state()["columnControl"]["5"]["searchInput"]["value"], json!(""));
}

#[test]
fn destroy_tears_children_down_once_in_order() {
    DESTROYED.with(|d| d.borrow_mut().clear());
    let grid = cities(1, GridOptions::default());
    let control = mount(
        &grid,
        0,
        content(json!([
            {"extend": "probe", "name": "a"},
            "searchText",
            {"extend": "probe", "name": "b"}
        ])),
    )
    .unwrap();
    assert_eq!(control.state(), Lifecycle::Populated);
    assert_eq!(control.pending_destroy(), 3);
    assert_eq!(control.wrapper().unwrap().children().len(), 3);
    assert!(grid.listener_count() > 0);

    let cell = grid.cell(0, Section::Header, 0).unwrap();
    assert_eq!(cell.borrow().wrappers().len(), 1);

    grid.destroy();
    grid.destroy();
    DESTROYED.with(|d| assert_eq!(*d.borrow(), vec!["a", "b"]));
    assert!(cell.borrow().wrappers().is_empty());
    assert_eq!(control.state(), Lifecycle::Destroyed);
    assert_eq!(control.pending_destroy(), 0);
    assert_eq!(grid.listener_count(), 0);
}

#[test]
fn destroy_remove_only_forgets_registered_components() {
    DESTROYED.with(|d| d.borrow_mut().clear());
    let grid = cities(1, GridOptions::default());
    let control = mount(&grid, 0, content(json!([{"extend": "probe", "name": "kept"}]))).unwrap();

    let stranger: DestroyRef = Rc::new(Probe {
        name: "stranger".into(),
    });
    control.destroy_remove(&stranger);
    assert_eq!(control.pending_destroy(), 1);

    let gone: DestroyRef = Rc::new(Probe { name: "gone".into() });
    control.destroy_add(gone.clone());
    control.destroy_remove(&gone);
    assert_eq!(control.pending_destroy(), 1);

    grid.destroy();
    DESTROYED.with(|d| assert_eq!(*d.borrow(), vec!["kept"]));
}

#[test]
fn server_side_searches_only_redraw() {
    let grid = cities(2, GridOptions::default().server_side(true));
    let control = mount(&grid, 0, content(json!(["search"]))).unwrap();
    let draws = grid.draw_count();

    search_for(&control, "oslo");
    assert_eq!(grid.draw_count(), draws + 1);
    assert_eq!(grid.visible_rows(), vec![0, 1, 2, 3, 4]);
    assert!(grid.search_fixed(0, "dtcc").is_none());
    let request = grid.last_request().unwrap();
    assert_eq!(
        request["columns"][0]["columnControl"]["search"],
        json!({"value": "oslo", "logic": "contains", "type": "text"})
    );
}

#[test]
fn client_side_searches_filter_rows() {
    let grid = cities(2, GridOptions::default());
    let control = mount(&grid, 1, content(json!(["searchText"]))).unwrap();

    search_for(&control, "OSLO");
    assert_eq!(grid.visible_rows(), vec![0, 2]);

    // contains -> notContains
    press(&control, KeyCode::Down);
    assert_eq!(grid.visible_rows(), vec![1, 3, 4]);

    // -> equal
    press(&control, KeyCode::Down);
    assert_eq!(grid.visible_rows(), vec![0, 2]);
    retype(&control, "lis");
    assert!(grid.visible_rows().is_empty());
    retype(&control, "lisbon");
    assert_eq!(grid.visible_rows(), vec![4]);

    // up to notEmpty, which ignores the term
    for _ in 0..3 {
        press(&control, KeyCode::Up);
    }
    assert_eq!(grid.visible_rows(), vec![0, 1, 2, 4]);

    let ctrl_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
    control.wrapper().unwrap().handle_key(ctrl_u);
    assert_eq!(grid.visible_rows(), vec![0, 1, 2, 3, 4]);
    assert!(grid.search_fixed(1, "dtcc").is_none());
}

#[test]
fn nested_searches_mark_their_dropdown_active() {
    let grid = cities(1, GridOptions::default());
    let control = mount(&grid, 0, content(json!(["searchDropdown"]))).unwrap();
    let dropdown = control.wrapper().unwrap().children()[0].clone();
    assert_eq!(dropdown.name(), "dropdown");

    let button_fg = || {
        let area = Rect::new(0, 0, 20, dropdown.height());
        let mut buf = Buffer::empty(area);
        dropdown.render(area, &mut buf, true);
        buf[(0, 0)].fg
    };
    assert_ne!(button_fg(), Color::Yellow);

    press(&control, KeyCode::Enter);
    assert_eq!(dropdown.height(), 2);
    for c in "lima".chars() {
        press(&control, KeyCode::Char(c));
    }
    press(&control, KeyCode::Enter);
    assert_eq!(grid.visible_rows(), vec![1]);
    assert_eq!(button_fg(), Color::Yellow);

    let ctrl_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
    control.wrapper().unwrap().handle_key(ctrl_u);
    assert_ne!(button_fg(), Color::Yellow);

    press(&control, KeyCode::Esc);
    assert_eq!(dropdown.height(), 1);
}

#[test]
fn class_names_land_on_the_target_row() {
    let grid = cities(2, GridOptions::default().header_rows(2usize));
    mount(
        &grid,
        0,
        ControlOptions::default()
            .class_name(ClassName::One("filters extra".into()))
            .target(Target::Row(1)),
    )
    .unwrap();
    mount(
        &grid,
        1,
        ControlOptions::default()
            .class_name(ClassName::Many(vec!["filters".into()]))
            .target(Target::Row(1)),
    )
    .unwrap();
    assert_eq!(grid.row_classes(Section::Header, 1), vec!["filters", "extra"]);
    assert!(grid.row_classes(Section::Header, 0).is_empty());
}

#[test]
fn footer_targets_mount_into_the_footer() {
    let grid = cities(1, GridOptions::default().footer_rows(1usize));
    let control = mount(
        &grid,
        0,
        content(json!(["searchText"])).target(Target::Selector("tfoot".into())),
    )
    .unwrap();
    let footer = grid.cell(0, Section::Footer, 0).unwrap();
    assert_eq!(footer.borrow().wrappers().len(), 1);
    assert!(Rc::ptr_eq(&footer, &control.target().unwrap()));
    assert!(grid.cell(0, Section::Header, 0).unwrap().borrow().wrappers().is_empty());

    let missing = mount(
        &grid,
        0,
        content(json!(["searchText"])).target(Target::Selector("tfoot:3".into())),
    );
    assert!(matches!(
        missing,
        Err(CCError::MissingTarget {
            section: Section::Footer,
            row: 3,
            ..
        })
    ));
}

#[test]
fn controllers_get_distinct_identities() {
    let grid = cities(2, GridOptions::default());
    let a = mount(&grid, 0, content(json!(["searchText"]))).unwrap();
    let b = mount(&grid, 1, content(json!(["searchText"]))).unwrap();
    assert_ne!(a.unique(), b.unique());
    assert_eq!(a.wrapper().unwrap().class(), "dtcc");
}

#[test]
fn external_clear_drops_the_filter_without_drawing() {
    let grid = cities(2, GridOptions::default());
    let control = mount(&grid, 1, content(json!(["searchText"]))).unwrap();
    search_for(&control, "lima");
    assert_eq!(grid.visible_rows(), vec![1]);
    let draws = grid.draw_count();

    grid.search_clear(1);
    assert_eq!(grid.draw_count(), draws);
    assert!(grid.search_fixed(1, "dtcc").is_none());
    assert_eq!(grid.visible_rows(), vec![1]);

    grid.draw(None);
    assert_eq!(grid.visible_rows(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn runtime_state_load_reapplies_the_saved_search() {
    let grid = cities(2, GridOptions::default());
    let _control = mount(&grid, 1, content(json!(["searchText"]))).unwrap();
    let record = json!({"logic": "equal", "type": "text", "value": "Lima"});
    let draws = grid.draw_count();

    grid.load_state(json!({"columnControl": {"1": {"searchInput": record.clone()}}}));
    assert_eq!(grid.draw_count(), draws);
    assert!(grid.search_fixed(1, "dtcc").is_some());
    assert_eq!(grid.save_state()["columnControl"]["1"]["searchInput"], record);

    grid.draw(None);
    assert_eq!(grid.visible_rows(), vec![1]);
}

#[test]
fn state_loads_do_not_nest() {
    let grid = cities(1, GridOptions::default());
    let input = SearchInputBuilder::new()
        .operators(vec![
            Operator::new("Contains", "contains"),
            Operator::new("Equals", "equal"),
        ])
        .build(grid.clone(), 0)
        .unwrap();
    let doc = json!({"columnControl": {"0": {"searchInput": {"logic": "equal", "type": "text", "value": "x"}}}});

    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = calls.clone();
    let host = grid.clone();
    let again = doc.clone();
    input.register_filter_callback(move |op, term, loading| {
        sink.borrow_mut().push((op.to_string(), term.to_string(), loading));
        host.load_state(again.clone());
    });

    grid.load_state(doc);
    assert_eq!(
        *calls.borrow(),
        vec![("equal".to_string(), "x".to_string(), true)]
    );
    assert!(!input.is_loading());
    assert_eq!(input.term(), "x");
}
