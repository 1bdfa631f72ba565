use choropleth::classify::Color;
use choropleth::config::AppConfig;
use choropleth::coordinator::Coordinator;
use choropleth::data::load_sources;
use choropleth::join::join_features;
use choropleth::render::{raster, Paint, SceneRenderer};
use choropleth::types::RegionKey;
use std::fs;
use tempfile::TempDir;

const CSV: &str = "\
adm1_code,name,rate,count
ESP-A,Alpha,10,7
ESP-B,Beta,50,n/a
ESP-C,Gamma,90,3
";

fn square(lon: f64, lat: f64) -> String {
    format!(
        "[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]",
        x0 = lon,
        y0 = lat,
        x1 = lon + 0.8,
        y1 = lat + 0.8
    )
}

fn feature(code: &str, lon: f64, lat: f64) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{"adm1_code":"{code}","name":"{code}"}},"geometry":{{"type":"Polygon","coordinates":{}}}}}"#,
        square(lon, lat)
    )
}

fn write_fixture(dir: &TempDir) -> AppConfig {
    let regions = format!(
        r#"{{"type":"FeatureCollection","features":[{},{},{},{}]}}"#,
        feature("ESP-A", -6.0, 39.0),
        feature("ESP-B", -5.0, 39.0),
        feature("ESP-C", -4.0, 39.0),
        feature("ESP-Z", -3.0, 39.0),
    );
    let countries = format!(
        r#"{{"type":"FeatureCollection","features":[{{"type":"Feature","properties":{{"name":"Spain"}},"geometry":{{"type":"Polygon","coordinates":{}}}}}]}}"#,
        square(-9.0, 36.0)
    );

    fs::write(dir.path().join("regions.csv"), CSV).unwrap();
    fs::write(dir.path().join("regions.geojson"), regions).unwrap();
    fs::write(dir.path().join("countries.json"), countries).unwrap();

    let toml = format!(
        r#"
        [data]
        tabular = "{dir}/regions.csv"
        regions = "{dir}/regions.geojson"
        background = "{dir}/countries.json"
        join_key = "adm1_code"
        attributes = ["rate", "count"]

        [map]
        width = 400.0
        height = 300.0

        [chart]
        y_max = 100.0
        "#,
        dir = dir.path().display()
    );
    AppConfig::from_toml_str(&toml).unwrap()
}

#[tokio::test]
async fn load_join_render_and_switch_attributes() {
    let dir = TempDir::new().unwrap();
    let config = write_fixture(&dir);
    let attributes = config.attribute_set().unwrap();

    let mut dataset = load_sources(&config.data).await.unwrap();
    let summary = join_features(
        &mut dataset.regions,
        &dataset.records,
        &attributes,
        &config.data.join_key,
    );
    assert_eq!(summary.matched, 3);
    assert_eq!(summary.unmatched_features, vec![RegionKey::from("ESP-Z")]);

    let mut coordinator = Coordinator::new(SceneRenderer::new(), dataset, &config).unwrap();

    let order: Vec<String> = coordinator.chart().order().iter().map(|k| k.to_string()).collect();
    assert_eq!(order, vec!["ESP-C", "ESP-B", "ESP-A"]);

    let map_svg = coordinator
        .renderer()
        .to_svg(coordinator.map().canvas())
        .unwrap();
    assert!(map_svg.contains(r#"class="regions ESP-Z""#));
    assert!(map_svg.contains(r#"class="countries""#));

    let orphan = coordinator
        .map()
        .regions()
        .iter()
        .find(|r| r.key.as_str() == "ESP-Z")
        .unwrap()
        .handle;
    assert_eq!(
        coordinator.renderer().element(orphan).unwrap().style.fill,
        Some(Paint::Color(Color::NO_DATA))
    );

    coordinator.select_attribute("count").unwrap();
    let order: Vec<String> = coordinator.chart().order().iter().map(|k| k.to_string()).collect();
    assert_eq!(order, vec!["ESP-A", "ESP-C", "ESP-B"]);

    let beta = coordinator
        .map()
        .regions()
        .iter()
        .find(|r| r.key.as_str() == "ESP-B")
        .unwrap()
        .handle;
    assert_eq!(
        coordinator.renderer().element(beta).unwrap().style.fill,
        Some(Paint::Color(Color::NO_DATA))
    );

    let chart_svg = coordinator
        .renderer()
        .to_svg(coordinator.chart().canvas())
        .unwrap();
    assert!(chart_svg.contains("Number of count in each region"));

    let png = raster::rasterize(coordinator.renderer(), coordinator.map().canvas()).unwrap();
    assert_eq!(png.dimensions(), (400, 300));
}

#[tokio::test]
async fn missing_source_aborts_before_rendering() {
    let dir = TempDir::new().unwrap();
    let mut config = write_fixture(&dir);
    config.data.regions = dir.path().join("nope.geojson");
    assert!(load_sources(&config.data).await.is_err());
}
