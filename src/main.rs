use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use skycast_core::{AppError, Config};
use skycast_dashboard::{
    position_source, provider_settings, Dashboard, DashboardSettings, DashboardView,
};
use skycast_services::{build_weather_context, AdviceRequest, AdvisorClient, DEFAULT_ADVICE_QUERY};
use skycast_weather::{LocationCache, WeatherProvider};

#[derive(Debug, Parser)]
#[command(author, version, about = "Weather dashboard for your current or a searched location")]
struct Cli {
    /// Place to search for; the device position is used when omitted
    place: Vec<String>,

    /// Ask the activity advisor about the current weather
    #[arg(long, num_args = 0.., value_name = "QUESTION")]
    advise: Option<Vec<String>>,
}

impl Cli {
    fn place(&self) -> String {
        self.place.join(" ")
    }

    fn advice_question(&self) -> Option<String> {
        self.advise.as_ref().map(|words| {
            if words.is_empty() {
                DEFAULT_ADVICE_QUERY.to_string()
            } else {
                words.join(" ")
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    skycast_core::init()?;
    let place = cli.place();

    let (config, _validation) = Config::load_validated()?;
    tracing::info!("Using config directory {}", config.config_dir.display());

    let provider = WeatherProvider::new(provider_settings(&config.weather))
        .context("Failed to create weather provider")?;
    let cache = LocationCache::new(&config.config_dir);
    tracing::debug!("Location cache at {}", cache.path().display());
    let mut dashboard = Dashboard::new(
        Arc::new(provider),
        position_source(&config.weather),
        cache,
        DashboardSettings::from(&config.weather),
    );

    if place.is_empty() {
        dashboard.start();
    } else {
        dashboard.set_query(place.as_str());
    }
    dashboard.run_until_idle().await;

    if !place.is_empty() {
        let first = dashboard.snapshot().locations().first().cloned();
        match first {
            Some(location) => {
                dashboard.select_location(Some(location));
                dashboard.run_until_idle().await;
            }
            None => println!("No locations found for \"{}\"", place),
        }
    }

    let view = dashboard.snapshot();
    print_view(&view);

    if let Some(question) = cli.advice_question() {
        if !view.show_weather {
            println!("\nAdvice needs weather data; pick a location first.");
            return Ok(());
        }
        let advisor = AdvisorClient::new(&config.advisor)?;
        let context = build_weather_context(
            view.state.selected_location.as_ref(),
            view.derived.converted.as_deref(),
            &view.state.units,
            chrono::Local::now(),
        );
        match advisor.advise(&AdviceRequest::new(&context, &question)).await {
            Ok(text) => println!("\n{text}"),
            Err(e) => {
                let err = AppError::from(e);
                tracing::error!("Advisor request failed: {}", err);
                println!("\n{}\n{}", err.user_message(), err);
            }
        }
    }

    Ok(())
}

fn print_view(view: &DashboardView) {
    for notice in &view.notices {
        println!("{}", notice.message);
    }

    let (Some(location), Some(forecast)) = (
        view.state.selected_location.as_ref(),
        view.derived.converted.as_ref(),
    ) else {
        return;
    };
    if !view.show_weather {
        return;
    }

    let units = &view.state.units;
    let current = &forecast.current;
    let system = if units.is_all_imperial() {
        "imperial"
    } else if *units == skycast_weather::UnitPreferences::metric() {
        "metric"
    } else {
        "mixed"
    };
    println!("{} ({system} units)", location.display_name());
    println!(
        "  [{}] {} {:.1}{} (feels like {:.1}{}), wind {:.1} {}",
        forecast.current_condition().icon_name(),
        forecast.current_condition().description(),
        current.temperature_2m,
        units.temperature.symbol(),
        current.apparent_temperature,
        units.temperature.symbol(),
        current.wind_speed_10m,
        units.wind.symbol(),
    );

    let daily = &forecast.daily;
    for (i, day) in daily.time.iter().enumerate() {
        let (Some(max), Some(min)) = (daily.temperature_2m_max.get(i), daily.temperature_2m_min.get(i))
        else {
            continue;
        };
        let marker = if *day == view.state.selected_day { '*' } else { ' ' };
        println!("{marker} {day}  {min:.0}..{max:.0}{}", units.temperature.symbol());
    }

    if let Some(hourly) = &view.derived.hourly {
        for (time, temp) in hourly.time.iter().zip(&hourly.temperature_2m) {
            let hour = time.split('T').nth(1).unwrap_or(time);
            println!("    {hour}  {temp:.1}{}", units.temperature.symbol());
        }
    }
}
