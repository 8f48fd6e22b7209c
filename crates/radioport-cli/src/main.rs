//! Radioport CLI - in-game radio stations in the terminal

mod audio;
mod cli;
mod command;
mod input;
mod library;
mod media_controls;
mod notifications;
mod settings;
mod stations;
mod view;

use std::fs;
use std::io;
use std::sync::mpsc::{ self, Receiver, Sender };
use std::sync::{ Arc, Mutex };
use std::time::{ Duration, Instant };

use anyhow::{ anyhow, Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyCode, KeyEventKind },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, List, ListItem, ListState, Paragraph, Wrap },
};
use tracing_subscriber::EnvFilter;

use audio::AudioDriver;
use cli::Args;
use command::Command;
use input::{ Action, InputBuffer, InputMode };
use library::{ LibraryScanner, ScanSummary };
use media_controls::{ MediaCommand, MediaControlsHandler };
use notifications::Notifier;
use settings::Settings;
use stations::{ StationInfo, STATIONS };
use view::ViewMode;

use radioport_core::{
    format_duration, Catalog, Category, Deck, RotationConfig, ScheduleEvent, Scheduler, SchedulerState,
    SegmentId,
};


/// Volume change per key press.
const VOLUME_STEP: f32 = 0.05;


/// Application state.
struct App {
    catalog: Arc<Catalog>,
    scheduler: Scheduler,
    deck: Deck<AudioDriver>,
    station: Option<&'static StationInfo>,
    should_quit: bool,
    last_tick: Instant,

    // View state
    view_mode: ViewMode,
    station_state: ListState,
    station_filter: String,
    help_scroll: u16,

    // Input state
    input_mode: InputMode,
    input_buffer: InputBuffer,

    // Status message (shown in status bar)
    status_message: Option<String>,
    status_clear_at: Option<Instant>,

    // Desktop integration
    notifier: Notifier,
    media_controls: Option<MediaControlsHandler>,
    media_tx: Sender<MediaCommand>,
    media_rx: Receiver<MediaCommand>,

    settings: Settings,
}


impl App {
    fn new( catalog: Arc<Catalog>, settings: Settings, summary: ScanSummary ) -> Result<Self> {
        let scheduler = Scheduler::new( Arc::clone( &catalog ), settings.rotation.clone() )?;
        let deck = Deck::new( AudioDriver::new( settings.volume ) );
        let notifier = Notifier::new( settings.notifications_enabled );

        let ( media_tx, media_rx ) = mpsc::channel();
        let media_controls = if settings.media_controls_enabled {
            MediaControlsHandler::new( media_tx.clone() )
        } else {
            None
        };

        let mut app = Self {
            catalog,
            scheduler,
            deck,
            station: None,
            should_quit: false,
            last_tick: Instant::now(),
            view_mode: ViewMode::NowPlaying,
            station_state: ListState::default(),
            station_filter: String::new(),
            help_scroll: 0,
            input_mode: InputMode::Normal,
            input_buffer: InputBuffer::new(),
            status_message: None,
            status_clear_at: None,
            notifier,
            media_controls,
            media_tx,
            media_rx,
            settings,
        };

        app.set_status( format!( "Loaded {} segments ({} skipped)", summary.segments, summary.skipped ) );
        Ok( app )
    }


    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + Duration::from_secs( 3 ) );
    }


    /// Advances the schedule by the wall time since the last tick.
    fn tick( &mut self ) {
        if let Some( clear_at ) = self.status_clear_at {
            if Instant::now() >= clear_at {
                self.status_message = None;
                self.status_clear_at = None;
            }
        }

        let now = Instant::now();
        let delta = now.duration_since( self.last_tick );
        self.last_tick = now;

        self.handle_media_commands();

        let was_on_air = self.scheduler.state() != SchedulerState::Stopped;
        self.scheduler.tick( delta );
        self.pump();

        if was_on_air && self.scheduler.state() == SchedulerState::Stopped {
            self.set_status( "Off air: nothing left to play" );
        }

        if let Some( controls ) = &mut self.media_controls {
            controls.update( self.scheduler.now_playing().as_ref() );
        }
    }


    /// Carries out buttons pressed on the OS media overlay.
    fn handle_media_commands( &mut self ) {
        while let Ok( command ) = self.media_rx.try_recv() {
            tracing::debug!( "Media control: {:?}", command );
            match command {
                MediaCommand::Play => {
                    let off_air = matches!( self.scheduler.state(), SchedulerState::Idle | SchedulerState::Stopped );
                    if off_air || self.scheduler.is_paused() {
                        self.perform( Action::TogglePause );
                    }
                }
                MediaCommand::Pause => {
                    let on_air = matches!( self.scheduler.state(), SchedulerState::Playing | SchedulerState::Transitioning );
                    if on_air && !self.scheduler.is_paused() {
                        self.perform( Action::TogglePause );
                    }
                }
                MediaCommand::Toggle => self.perform( Action::TogglePause ),
                MediaCommand::Stop => self.perform( Action::Stop ),
                MediaCommand::Next => self.step_station( 1 ),
                MediaCommand::Previous => self.step_station( -1 ),
            }
        }
    }


    /// Hands pending schedule events to the deck and reports failures back.
    fn pump( &mut self ) {
        let events = self.scheduler.drain_events();
        for event in &events {
            if let ScheduleEvent::SegmentStarted( entry ) = event {
                self.notifier.announce( &entry.segment );
            }
        }
        if !events.is_empty() {
            for id in self.deck.apply( &events ) {
                self.report_failure( &id );
            }
        }

        if let Some( id ) = self.deck.poll() {
            self.report_failure( &id );
        }
    }


    fn report_failure( &mut self, id: &SegmentId ) {
        self.scheduler.report_playback_error( id );
        self.set_status( format!( "Cannot play {}", id ) );
    }


    /// Starts a fresh session on `station`. The current one keeps playing if
    /// the station cannot be started.
    ///
    /// A station the listener picked opens with a jingle; stepping along the
    /// dial tunes in mid-song.
    fn tune( &mut self, station: &'static StationInfo, picked: bool ) {
        let config = session_config( &self.settings.rotation, picked );
        let mut scheduler = match Scheduler::new( Arc::clone( &self.catalog ), config ) {
            Ok( s ) => s,
            Err( e ) => {
                self.set_status( format!( "Error: {}", e ) );
                return;
            }
        };

        if let Err( e ) = scheduler.select( station.name ) {
            tracing::warn!( "Cannot tune to {}: {}", station.name, e );
            self.set_status( format!( "{}: {}", station.short_name(), e ) );
            return;
        }

        self.scheduler.stop();
        let ended = self.scheduler.drain_events();
        self.deck.apply( &ended );
        self.deck.halt();

        self.scheduler = scheduler;
        self.last_tick = Instant::now();
        self.station = Some( station );
        self.settings.station = Some( station.name.to_string() );
        self.pump();
        self.set_status( format!( "Tuned to {}", station.name ) );
    }


    fn step_station( &mut self, offset: isize ) {
        let from = self.station.map( |s| s.name ).unwrap_or( STATIONS[ 0 ].name );
        let target = if self.station.is_some() { stations::step( from, offset ) } else { &STATIONS[ 0 ] };
        self.tune( target, false );
    }


    fn set_volume( &mut self, volume: f32 ) {
        self.deck.sink_mut().set_volume( volume );
        self.settings.volume = self.deck.sink().volume();
        self.set_status( format!( "Volume: {}%", ( self.settings.volume * 100.0 ).round() as i32 ) );
    }


    fn visible_stations( &self ) -> Vec<&'static StationInfo> {
        filter_stations( &self.station_filter )
    }


    /// Handles a key event.
    fn handle_key( &mut self, code: KeyCode ) {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key( code ),
            InputMode::Command => self.handle_command_key( code ),
            InputMode::Filter => self.handle_filter_key( code ),
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode ) {
        let consumed = match self.view_mode {
            ViewMode::Stations => self.handle_stations_key( code ),
            ViewMode::Help => self.handle_help_key( code ),
            _ => false,
        };

        if !consumed {
            if let Some( action ) = input::map_key( code ) {
                self.perform( action );
            }
        }
    }


    /// Station list navigation. Returns true if the key was used.
    fn handle_stations_key( &mut self, code: KeyCode ) -> bool {
        let count = self.visible_stations().len();
        match code {
            KeyCode::Up | KeyCode::Char( 'k' ) => {
                let i = self.station_state.selected().unwrap_or( 0 );
                self.station_state.select( Some( i.saturating_sub( 1 ) ) );
            }
            KeyCode::Down | KeyCode::Char( 'j' ) => {
                let i = self.station_state.selected().map( |i| i + 1 ).unwrap_or( 0 );
                self.station_state.select( Some( i.min( count.saturating_sub( 1 ) ) ) );
            }
            KeyCode::Enter => {
                let selected = self.station_state.selected().unwrap_or( 0 );
                if let Some( station ) = self.visible_stations().get( selected ).copied() {
                    self.tune( station, true );
                    self.view_mode = ViewMode::NowPlaying;
                }
            }
            KeyCode::Char( 'f' ) => {
                self.input_mode = InputMode::Filter;
                self.input_buffer.clear();
                for c in self.station_filter.chars() {
                    self.input_buffer.insert( c );
                }
            }
            _ => return false,
        }
        true
    }


    fn handle_help_key( &mut self, code: KeyCode ) -> bool {
        match code {
            KeyCode::Up | KeyCode::Char( 'k' ) => self.help_scroll = self.help_scroll.saturating_sub( 1 ),
            KeyCode::Down | KeyCode::Char( 'j' ) => self.help_scroll = self.help_scroll.saturating_add( 1 ),
            KeyCode::Char( '?' ) | KeyCode::Esc => self.view_mode = ViewMode::NowPlaying,
            _ => return false,
        }
        true
    }


    fn handle_command_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.content().to_string();
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
                self.execute_command( &input );
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Delete => self.input_buffer.delete(),
            KeyCode::Left => self.input_buffer.move_left(),
            KeyCode::Right => self.input_buffer.move_right(),
            KeyCode::Home => self.input_buffer.move_home(),
            KeyCode::End => self.input_buffer.move_end(),
            KeyCode::Char( c ) => self.input_buffer.insert( c ),
            _ => {}
        }
    }


    fn handle_filter_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter | KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                if code == KeyCode::Esc {
                    self.station_filter.clear();
                }
                self.input_buffer.clear();
            }
            KeyCode::Backspace => self.input_buffer.backspace(),
            KeyCode::Char( c ) => self.input_buffer.insert( c ),
            _ => return,
        }

        if self.input_mode == InputMode::Filter {
            self.station_filter = self.input_buffer.content().to_string();
        }
        self.station_state.select( Some( 0 ) );
    }


    fn perform( &mut self, action: Action ) {
        match action {
            Action::TogglePause => match self.scheduler.state() {
                SchedulerState::Idle | SchedulerState::Stopped => match self.station {
                    Some( station ) => self.tune( station, false ),
                    None => self.perform( Action::StationList ),
                },
                _ => {
                    self.scheduler.toggle_pause();
                    self.pump();
                    self.set_status( if self.scheduler.is_paused() { "Paused" } else { "Resumed" } );
                }
            },
            Action::Skip => {
                self.scheduler.skip();
                self.pump();
            }
            Action::Stop => {
                self.scheduler.stop();
                self.pump();
                self.set_status( "Stopped" );
            }
            Action::NextStation => self.step_station( 1 ),
            Action::PrevStation => self.step_station( -1 ),
            Action::VolumeUp => self.set_volume( self.deck.sink().volume() + VOLUME_STEP ),
            Action::VolumeDown => self.set_volume( self.deck.sink().volume() - VOLUME_STEP ),
            Action::Mute => {
                let muted = self.deck.sink_mut().toggle_mute();
                self.set_status( if muted { "Muted" } else { "Unmuted" } );
            }
            Action::CommandMode => {
                self.input_mode = InputMode::Command;
                self.input_buffer.clear();
            }
            Action::StationList => {
                self.view_mode = ViewMode::Stations;
                self.station_filter.clear();
                let current = self.station.and_then( |s| stations::index_of( s.name ) );
                self.station_state.select( Some( current.unwrap_or( 0 ) ) );
            }
            Action::NextView => self.view_mode = self.view_mode.next_tab(),
            Action::PrevView => self.view_mode = self.view_mode.prev_tab(),
            Action::Help => {
                self.help_scroll = 0;
                self.view_mode = ViewMode::Help;
            }
            Action::Back => self.view_mode = ViewMode::NowPlaying,
            Action::Quit => self.should_quit = true,
        }
    }


    fn execute_command( &mut self, input: &str ) {
        match Command::parse( input ) {
            Ok( cmd ) => {
                if let Err( e ) = self.run_command( cmd ) {
                    self.set_status( format!( "Error: {}", e ) );
                }
            }
            Err( e ) => {
                self.set_status( format!( "{}", e ) );
            }
        }
    }


    fn run_command( &mut self, cmd: Command ) -> Result<()> {
        if let Some( config ) = cmd.rotation_change( &self.settings.rotation ) {
            self.scheduler.reconfigure( config.clone() )?;
            self.settings.rotation = config;
            self.set_status( "Rotation updated" );
            return Ok(());
        }

        match cmd {
            Command::Station { query } => {
                let station = stations::find( &query )
                    .ok_or_else( || anyhow!( "No station matches '{}'", query ) )?;
                self.tune( station, true );
            }
            Command::Next => self.perform( Action::NextStation ),
            Command::Prev => self.perform( Action::PrevStation ),
            Command::Stations => self.perform( Action::StationList ),
            Command::Skip => self.perform( Action::Skip ),
            Command::Pause => self.perform( Action::TogglePause ),
            Command::Stop => self.perform( Action::Stop ),
            Command::Volume { level: Some( level ) } => self.set_volume( level as f32 / 100.0 ),
            Command::Volume { level: None } => {
                let volume = ( self.deck.sink().volume() * 100.0 ).round() as i32;
                self.set_status( format!( "Volume: {}%", volume ) );
            }
            Command::Mute => self.perform( Action::Mute ),
            Command::Notify => {
                let enabled = !self.notifier.is_enabled();
                self.notifier.set_enabled( enabled );
                self.settings.notifications_enabled = enabled;
                self.set_status( if enabled { "Notifications on" } else { "Notifications off" } );
            }
            Command::Media => self.toggle_media_controls(),
            Command::Help => self.perform( Action::Help ),
            Command::Quit => self.should_quit = true,

            // Applied above
            Command::Spacing { .. }
            | Command::Weight { .. }
            | Command::Window { .. }
            | Command::Lookahead { .. }
            | Command::Seed { .. }
            | Command::Reset => {}
        }
        Ok(())
    }


    fn toggle_media_controls( &mut self ) {
        if self.media_controls.take().is_some() {
            self.settings.media_controls_enabled = false;
            self.set_status( "Media controls off" );
            return;
        }

        self.settings.media_controls_enabled = true;
        self.media_controls = MediaControlsHandler::new( self.media_tx.clone() );
        if self.media_controls.is_some() {
            self.set_status( "Media controls on" );
        } else {
            self.set_status( "Media controls unavailable" );
        }
    }


    /// Saves the station, volume and rotation for the next start.
    fn save_session( &mut self ) {
        self.scheduler.stop();
        let ended = self.scheduler.drain_events();
        self.deck.apply( &ended );
        self.deck.halt();
        self.settings.save();
    }
}


/// Rotation for a new session. Picked stations always open with a jingle.
fn session_config( base: &RotationConfig, picked: bool ) -> RotationConfig {
    RotationConfig {
        start_with_jingle: base.start_with_jingle || picked,
        ..base.clone()
    }
}


/// Stations whose name contains `filter`, in dial order.
fn filter_stations( filter: &str ) -> Vec<&'static StationInfo> {
    let filter = filter.trim().to_lowercase();
    STATIONS.iter()
        .filter( |s| filter.is_empty() || s.name.to_lowercase().contains( &filter ) )
        .collect()
}


/// Sends logs to `<data dir>/radioport/radioport.log`. The terminal belongs to the TUI.
fn init_logging() {
    let Some( dir ) = dirs::data_dir().map( |d| d.join( "radioport" ) ) else {
        return;
    };
    if let Err( e ) = fs::create_dir_all( &dir ) {
        eprintln!( "Logging disabled: {}", e );
        return;
    }

    let log_file = match fs::OpenOptions::new().create( true ).append( true ).open( dir.join( "radioport.log" ) ) {
        Ok( f ) => f,
        Err( e ) => {
            eprintln!( "Logging disabled: {}", e );
            return;
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new( "info" ) );
    tracing_subscriber::fmt()
        .with_writer( Mutex::new( log_file ) )
        .with_ansi( false )
        .with_target( false )
        .with_env_filter( filter )
        .init();
}


fn print_stations() {
    for station in STATIONS {
        let mut extras = Vec::new();
        if let Some( dj ) = station.dj {
            extras.push( format!( "DJ {}", dj ) );
        }
        if !station.has_ads {
            extras.push( "no ads".to_string() );
        }
        if !station.has_jingles {
            extras.push( "no jingles".to_string() );
        }
        println!( "{:<26} {}", station.name, extras.join( ", " ) );
    }
}


fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_stations {
        print_stations();
        return Ok(());
    }

    init_logging();

    let mut settings = Settings::load();
    settings.merge_args( &args );

    let data_dir = settings.data_dir_or_default();
    let ( catalog, summary ) = LibraryScanner::new( &data_dir )
        .scan()
        .with_context( || format!( "Cannot load the audio library from {}", data_dir.display() ) )?;
    if catalog.is_empty() {
        return Err( anyhow!( "No playable audio under {}", data_dir.join( "audio" ).display() ) );
    }
    let catalog = Arc::new( catalog );

    let requested = settings.station.clone();
    let start = requested.as_deref()
        .and_then( stations::find )
        .or_else( || STATIONS.iter().find( |s| catalog.validate( s.name ).is_ok() ) );

    let mut app = App::new( Arc::clone( &catalog ), settings, summary )?;
    match start {
        Some( station ) => app.tune( station, true ),
        None => app.perform( Action::StationList ),
    }
    if let ( Some( query ), None ) = ( &requested, requested.as_deref().and_then( stations::find ) ) {
        app.set_status( format!( "No station matches '{}'", query ) );
    }

    // Setup terminal
    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;

    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    // Main loop
    loop {
        app.tick();

        terminal.draw( |frame| draw_ui( frame, &mut app ) )?;

        if event::poll( Duration::from_millis( 100 ) )? {
            if let Event::Key( key ) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key( key.code );
                }
            }
        }

        if app.should_quit {
            app.save_session();
            break;
        }
    }

    // Cleanup
    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    Ok(())
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Header
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 5 ),  // Now playing
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( area );

    let station = app.station.map( |s| s.name ).unwrap_or( "not tuned" );
    let header = Paragraph::new( format!( "  RADIOPORT - {}  ·  {}", app.view_mode.title(), station ) )
        .style( Style::default().fg( Color::Cyan ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( header, chunks[ 0 ] );

    match app.view_mode {
        ViewMode::NowPlaying => draw_schedule( frame, app, chunks[ 1 ] ),
        ViewMode::Stations => draw_stations( frame, app, chunks[ 1 ] ),
        ViewMode::Rotation => draw_rotation( frame, app, chunks[ 1 ] ),
        ViewMode::Help => draw_help( frame, app, chunks[ 1 ] ),
    }

    draw_now_playing( frame, app, chunks[ 2 ] );
    draw_status_bar( frame, app, chunks[ 3 ] );
}


fn category_color( category: Category ) -> Color {
    match category {
        Category::Song => Color::White,
        Category::DjLine => Color::Magenta,
        Category::Jingle => Color::Yellow,
        Category::Advert => Color::Blue,
    }
}


fn progress_bar( ratio: f64, width: usize ) -> String {
    let filled = ( ratio.clamp( 0.0, 1.0 ) * width as f64 ).round() as usize;
    format!( "[{}{}]", "━".repeat( filled ), "─".repeat( width - filled ) )
}


/// Queue and session counters side by side.
fn draw_schedule( frame: &mut Frame, app: &App, area: Rect ) {
    let columns = Layout::default()
        .direction( Direction::Horizontal )
        .constraints([ Constraint::Percentage( 60 ), Constraint::Percentage( 40 ) ])
        .split( area );

    let now = app.scheduler.session_time();
    let upcoming: Vec<ListItem> = app.scheduler.upcoming()
        .map( |entry| {
            let wait = entry.start.saturating_sub( now );
            let category = entry.segment.category;
            ListItem::new( Line::from( vec![
                Span::styled( format!( " in {:>5}  ", format_duration( wait ) ), Style::default().fg( Color::DarkGray ) ),
                Span::styled( format!( "{:<7}", category.label() ), Style::default().fg( category_color( category ) ) ),
                Span::raw( entry.segment.display_name() ),
            ]))
        })
        .collect();

    let queue = List::new( upcoming )
        .block( Block::default().title( " Up Next " ).borders( Borders::ALL ) );
    frame.render_widget( queue, columns[ 0 ] );

    let mut lines = Vec::new();
    if let Some( session ) = app.scheduler.session() {
        let config = app.scheduler.config();
        lines.push( Line::from( format!( " On air     {}", format_duration( now ) ) ) );
        lines.push( Line::from( format!( " Played     {}", session.played() ) ) );
        if session.failed_count() > 0 {
            lines.push( Line::from( Span::styled(
                format!( " Failed     {}", session.failed_count() ),
                Style::default().fg( Color::Red ),
            )));
        }
        lines.push( Line::from( "" ) );
        lines.push( Line::from( Span::styled( " Since last (min spacing)", Style::default().fg( Color::DarkGray ) ) ) );

        let carried = app.catalog.all_categories( session.station() );
        for category in Category::ALL.into_iter().filter( |c| carried.contains( c ) ) {
            let since = session.since_last( category );
            let spacing = config.rule( category ).min_spacing;
            let style = if since >= spacing { Style::default().fg( Color::Green ) } else { Style::default() };
            lines.push( Line::from( Span::styled( format!( " {:<8} {:>3}  ({})", category.label(), since, spacing ), style ) ) );
        }

        lines.push( Line::from( "" ) );
        lines.push( Line::from( Span::styled( " Recently", Style::default().fg( Color::DarkGray ) ) ) );
        for id in session.history().recent().take( 6 ) {
            let name = app.catalog.segment( session.station(), id )
                .map( |s| s.display_name() )
                .unwrap_or_else( || id.to_string() );
            lines.push( Line::from( format!( "  {}", name ) ) );
        }
    }

    let counters = Paragraph::new( lines )
        .block( Block::default().title( " Session " ).borders( Borders::ALL ) );
    frame.render_widget( counters, columns[ 1 ] );
}


fn draw_stations( frame: &mut Frame, app: &mut App, area: Rect ) {
    let current = app.station.map( |s| s.name );
    let items: Vec<ListItem> = app.visible_stations()
        .into_iter()
        .map( |station| {
            let count: usize = Category::ALL.iter()
                .map( |c| app.catalog.segments_for( station.name, *c ).len() )
                .sum();

            let mut extras = Vec::new();
            if let Some( dj ) = station.dj {
                extras.push( format!( "DJ {}", dj ) );
            }
            if !station.has_ads {
                extras.push( "no ads".to_string() );
            }

            let marker = if current == Some( station.name ) { "▶" } else { " " };
            let style = if app.catalog.validate( station.name ).is_ok() {
                Style::default()
            } else {
                Style::default().fg( Color::DarkGray )
            };
            ListItem::new( format!(
                " {} {:>6}  {:<22} {:>4} segments  {}",
                marker,
                station.frequency(),
                station.short_name(),
                count,
                extras.join( ", " ),
            )).style( style )
        })
        .collect();

    let title = if app.station_filter.is_empty() {
        " Stations ".to_string()
    } else {
        format!( " Stations matching '{}' ", app.station_filter )
    };

    let list = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( list, area, &mut app.station_state );
}


fn draw_rotation( frame: &mut Frame, app: &App, area: Rect ) {
    let config = app.scheduler.config();
    let carried = app.station
        .map( |s| app.catalog.all_categories( s.name ) )
        .unwrap_or_default();

    let mut lines = vec![
        Line::from( Span::styled( "  Category   Spacing   Weight   On this station", Style::default().bold() ) ),
    ];
    for category in Category::ALL {
        let rule = config.rule( category );
        lines.push( Line::from( format!(
            "  {:<10} {:>7}   {:>6.2}   {}",
            category.label(),
            rule.min_spacing,
            rule.weight,
            if carried.contains( &category ) { "yes" } else { "-" },
        )));
    }

    lines.push( Line::from( "" ) );
    lines.push( Line::from( format!( "  No-repeat window   {}", config.no_repeat_window ) ) );
    lines.push( Line::from( format!( "  History            {}", config.history_window ) ) );
    lines.push( Line::from( format!( "  Lookahead          {}", config.lookahead ) ) );
    lines.push( Line::from( format!(
        "  Seed               {}",
        config.seed.map( |s| s.to_string() ).unwrap_or_else( || "time-based".into() ),
    )));
    lines.push( Line::from( format!( "  Open with jingle   {}", if config.start_with_jingle { "yes" } else { "no" } ) ) );
    lines.push( Line::from( format!( "  Tune in mid-song   {}", if config.tune_in { "yes" } else { "no" } ) ) );
    lines.push( Line::from( "" ) );
    lines.push( Line::from( Span::styled(
        "  Change with /spacing, /weight, /window, /lookahead, /seed, /reset",
        Style::default().fg( Color::DarkGray ),
    )));

    let rotation = Paragraph::new( lines )
        .block( Block::default().title( " Rotation " ).borders( Borders::ALL ) );
    frame.render_widget( rotation, area );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let help_text = command::help_text();
    let line_count = help_text.lines().count() as u16;
    let visible_height = area.height.saturating_sub( 2 );

    let max_scroll = line_count.saturating_sub( visible_height );
    if app.help_scroll > max_scroll {
        app.help_scroll = max_scroll;
    }

    let help = Paragraph::new( help_text )
        .block( Block::default()
            .title( " Help (↑↓ scroll, ? or Esc to close) " )
            .borders( Borders::ALL )
        )
        .wrap( Wrap { trim: false } )
        .scroll(( app.help_scroll, 0 ));

    frame.render_widget( help, area );
}


fn draw_now_playing( frame: &mut Frame, app: &App, area: Rect ) {
    let lines = match app.scheduler.now_playing() {
        Some( np ) => {
            let icon = if np.paused { "⏸" } else if np.transitioning { "…" } else { "▶" };
            let category = np.segment.category;

            let detail = match &np.segment.subtitle {
                Some( text ) => Span::styled( format!( "   \"{}\" ", text ), Style::default().fg( Color::Gray ).italic() ),
                None => Span::styled( format!( "   {} ", np.station ), Style::default().fg( Color::Gray ) ),
            };

            let volume = if app.deck.sink().is_muted() {
                "muted".to_string()
            } else {
                format!( "{}%", ( app.deck.sink().volume() * 100.0 ).round() as i32 )
            };

            vec![
                Line::from( vec![
                    Span::styled( format!( " {} ", icon ), Style::default().bold() ),
                    Span::styled( format!( "[{}] ", category.label() ), Style::default().fg( category_color( category ) ) ),
                    Span::styled( np.segment.display_name(), Style::default().bold() ),
                ]),
                Line::from( detail ),
                Line::from( format!(
                    " {} {} / {}  -{}  {}",
                    progress_bar( np.ratio, 24 ),
                    format_duration( np.elapsed ),
                    format_duration( np.segment.duration ),
                    format_duration( np.remaining ),
                    volume,
                )),
            ]
        }
        None => {
            let message = match app.scheduler.state() {
                SchedulerState::Stopped => " Off air. [Space] to tune back in",
                _ => " Not tuned. [l] for the station list",
            };
            vec![ Line::from( Span::styled( message, Style::default().fg( Color::DarkGray ) ) ) ]
        }
    };

    let now_playing = Paragraph::new( lines )
        .block( Block::default().title( " Now Playing " ).borders( Borders::ALL ) );

    frame.render_widget( now_playing, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( text, style ) = match app.input_mode {
        InputMode::Command => {
            ( format!( "/{}", app.input_buffer.content() ), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Filter => {
            ( format!( "Filter: {}", app.input_buffer.content() ), Style::default().fg( Color::Yellow ) )
        }
        InputMode::Normal => {
            if let Some( ref msg ) = app.status_message {
                ( msg.clone(), Style::default().fg( Color::Green ) )
            } else {
                let hint = match app.view_mode {
                    ViewMode::NowPlaying => " [/]Cmd [Tab]Views [Space]Pause [s]Skip [←→]Station [l]List [?]Help [q]Quit ",
                    ViewMode::Stations => " [↑↓]Select [Enter]Tune [f]Filter [Tab]Views [Esc]Back ",
                    ViewMode::Rotation => " [/]Cmd [Tab]Views [Esc]Back ",
                    ViewMode::Help => " [↑↓]Scroll [?/Esc]Close ",
                };
                ( hint.to_string(), Style::default().fg( Color::DarkGray ) )
            }
        }
    };

    let status = Paragraph::new( text ).style( style );
    frame.render_widget( status, area );

    if app.input_mode != InputMode::Normal {
        let prefix = if app.input_mode == InputMode::Command { 1 } else { 8 };
        let cursor_x = area.x + prefix + app.input_buffer.cursor_char_pos() as u16;
        frame.set_cursor_position(( cursor_x, area.y ));
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_filter_stations() {
        assert_eq!( filter_stations( "" ).len(), STATIONS.len() );

        let fm: Vec<_> = filter_stations( " FM" ).into_iter().map( |s| s.name ).collect();
        assert!( fm.contains( &"92.9 Night FM" ) );
        assert!( !fm.contains( &"99.9 Impulse" ) );

        assert!( filter_stations( "no such station" ).is_empty() );
    }


    #[test]
    fn test_picked_station_opens_with_jingle() {
        let base = RotationConfig::default();
        assert!( !base.start_with_jingle );

        let picked = session_config( &base, true );
        assert!( picked.start_with_jingle );
        assert!( picked.tune_in );
        assert_eq!( picked.lookahead, base.lookahead );

        assert!( !session_config( &base, false ).start_with_jingle );

        let always = RotationConfig { start_with_jingle: true, ..base };
        assert!( session_config( &always, false ).start_with_jingle );
    }


    #[test]
    fn test_progress_bar() {
        assert_eq!( progress_bar( 0.0, 4 ), "[────]" );
        assert_eq!( progress_bar( 0.5, 4 ), "[━━──]" );
        assert_eq!( progress_bar( 3.0, 4 ), "[━━━━]" );
    }
}
