//! Minimal per-language projects written when code generation is unusable.

use crate::core::language::Language;
use crate::core::types::{GeneratedFile, GeneratedFileSet};

/// Shape of the fallback project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Basic,
    Api,
}

const API_KEYWORDS: &[&str] = &["api", "rest", "endpoint", "health", "server"];

impl Flavor {
    /// Pick a flavor from request keywords.
    pub fn for_request(request: &str) -> Flavor {
        let lowered = request.to_lowercase();
        if API_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            Flavor::Api
        } else {
            Flavor::Basic
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Flavor::Basic => "basic",
            Flavor::Api => "api",
        }
    }
}

/// Build the fallback file set for a language and request.
///
/// `Unknown` falls back to the python scaffold.
pub fn fallback_files(language: Language, request: &str) -> GeneratedFileSet {
    let flavor = Flavor::for_request(request);
    let files = match (language, flavor) {
        (Language::Python | Language::Unknown, Flavor::Basic) => python_basic(),
        (Language::Python | Language::Unknown, Flavor::Api) => python_api(),
        (Language::Javascript, flavor) => javascript(flavor),
        (Language::Typescript, flavor) => typescript(flavor),
        (Language::Csharp, flavor) => csharp(flavor),
        (Language::Java, flavor) => java(flavor),
        (Language::Go, Flavor::Basic) => go_basic(),
        (Language::Go, Flavor::Api) => go_api(),
        (Language::Rust, flavor) => rust(flavor),
        (Language::Php, flavor) => php(flavor),
        (Language::Ruby, flavor) => ruby(flavor),
    };
    let shown = match language {
        Language::Unknown => Language::Python,
        other => other,
    };
    GeneratedFileSet {
        files,
        summary: format!("Fallback {shown} {} scaffold", flavor.as_str()),
    }
}

fn python_basic() -> Vec<GeneratedFile> {
    vec![
        GeneratedFile::new(
            "main.py",
            r#""""Application entry point."""


def greet(name: str) -> str:
    return f"Hello, {name}!"


def main() -> None:
    print(greet("world"))


if __name__ == "__main__":
    main()
"#,
        ),
        GeneratedFile::new(
            "tests/test_main.py",
            r#"from main import greet


def test_greet():
    assert greet("world") == "Hello, world!"
"#,
        ),
        GeneratedFile::new("requirements.txt", "pytest\n"),
    ]
}

fn python_api() -> Vec<GeneratedFile> {
    vec![
        GeneratedFile::new(
            "app.py",
            r#""""Minimal HTTP API with a health check."""
import json
from http.server import BaseHTTPRequestHandler, HTTPServer


def health() -> dict:
    return {"status": "ok"}


class Handler(BaseHTTPRequestHandler):
    def do_GET(self):
        if self.path == "/health":
            body = json.dumps(health()).encode()
            self.send_response(200)
            self.send_header("Content-Type", "application/json")
            self.end_headers()
            self.wfile.write(body)
        else:
            self.send_response(404)
            self.end_headers()


if __name__ == "__main__":
    HTTPServer(("0.0.0.0", 8000), Handler).serve_forever()
"#,
        ),
        GeneratedFile::new(
            "tests/test_app.py",
            r#"from app import health


def test_health():
    assert health() == {"status": "ok"}
"#,
        ),
        GeneratedFile::new("requirements.txt", "pytest\n"),
    ]
}

fn javascript(flavor: Flavor) -> Vec<GeneratedFile> {
    let index = match flavor {
        Flavor::Basic => {
            r#"function greet(name) {
  return `Hello, ${name}!`;
}

if (require.main === module) {
  console.log(greet("world"));
}

module.exports = { greet };
"#
        }
        Flavor::Api => {
            r#"const http = require("http");

function health() {
  return { status: "ok" };
}

function handler(req, res) {
  if (req.url === "/health") {
    res.writeHead(200, { "Content-Type": "application/json" });
    res.end(JSON.stringify(health()));
    return;
  }
  res.writeHead(404);
  res.end();
}

if (require.main === module) {
  http.createServer(handler).listen(3000);
}

module.exports = { health, handler };
"#
        }
    };
    let test = match flavor {
        Flavor::Basic => {
            r#"const test = require("node:test");
const assert = require("node:assert");
const { greet } = require("./index");

test("greet", () => {
  assert.strictEqual(greet("world"), "Hello, world!");
});
"#
        }
        Flavor::Api => {
            r#"const test = require("node:test");
const assert = require("node:assert");
const { health } = require("./index");

test("health", () => {
  assert.deepStrictEqual(health(), { status: "ok" });
});
"#
        }
    };
    vec![
        GeneratedFile::new(
            "package.json",
            r#"{
  "name": "app",
  "version": "0.1.0",
  "main": "index.js",
  "scripts": {
    "start": "node index.js",
    "test": "node --test"
  }
}
"#,
        ),
        GeneratedFile::new("index.js", index),
        GeneratedFile::new("index.test.js", test),
    ]
}

fn typescript(flavor: Flavor) -> Vec<GeneratedFile> {
    let index = match flavor {
        Flavor::Basic => {
            r#"export function greet(name: string): string {
  return `Hello, ${name}!`;
}
"#
        }
        Flavor::Api => {
            r#"import { createServer, IncomingMessage, ServerResponse } from "http";

export function health(): { status: string } {
  return { status: "ok" };
}

export function handler(req: IncomingMessage, res: ServerResponse): void {
  if (req.url === "/health") {
    res.writeHead(200, { "Content-Type": "application/json" });
    res.end(JSON.stringify(health()));
    return;
  }
  res.writeHead(404);
  res.end();
}

if (require.main === module) {
  createServer(handler).listen(3000);
}
"#
        }
    };
    let test = match flavor {
        Flavor::Basic => {
            r#"import { greet } from "./index";

test("greet", () => {
  expect(greet("world")).toBe("Hello, world!");
});
"#
        }
        Flavor::Api => {
            r#"import { health } from "./index";

test("health", () => {
  expect(health()).toEqual({ status: "ok" });
});
"#
        }
    };
    vec![
        GeneratedFile::new(
            "package.json",
            r#"{
  "name": "app",
  "version": "0.1.0",
  "scripts": {
    "build": "tsc",
    "test": "jest"
  },
  "devDependencies": {
    "@types/jest": "^29.5.0",
    "@types/node": "^20.0.0",
    "jest": "^29.7.0",
    "ts-jest": "^29.1.0",
    "typescript": "^5.4.0"
  },
  "jest": {
    "preset": "ts-jest"
  }
}
"#,
        ),
        GeneratedFile::new(
            "tsconfig.json",
            r#"{
  "compilerOptions": {
    "target": "ES2020",
    "module": "commonjs",
    "strict": true,
    "outDir": "dist",
    "esModuleInterop": true
  },
  "include": ["src"]
}
"#,
        ),
        GeneratedFile::new("src/index.ts", index),
        GeneratedFile::new("src/index.test.ts", test),
    ]
}

fn csharp(flavor: Flavor) -> Vec<GeneratedFile> {
    match flavor {
        Flavor::Basic => vec![
            GeneratedFile::new(
                "App.csproj",
                r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <OutputType>Exe</OutputType>
    <TargetFramework>net8.0</TargetFramework>
    <Nullable>enable</Nullable>
  </PropertyGroup>
</Project>
"#,
            ),
            GeneratedFile::new(
                "Program.cs",
                r#"namespace App;

public static class Program
{
    public static string Greet(string name) => $"Hello, {name}!";

    public static void Main() => System.Console.WriteLine(Greet("world"));
}
"#,
            ),
        ],
        Flavor::Api => vec![
            GeneratedFile::new(
                "App.csproj",
                r#"<Project Sdk="Microsoft.NET.Sdk.Web">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Nullable>enable</Nullable>
  </PropertyGroup>
</Project>
"#,
            ),
            GeneratedFile::new(
                "Program.cs",
                r#"var builder = WebApplication.CreateBuilder(args);
var app = builder.Build();

app.MapGet("/health", () => Results.Ok(new { status = "ok" }));

app.Run();
"#,
            ),
        ],
    }
}

fn java(flavor: Flavor) -> Vec<GeneratedFile> {
    let main = match flavor {
        Flavor::Basic => {
            r#"package app;

public class App {
    public static String greet(String name) {
        return "Hello, " + name + "!";
    }

    public static void main(String[] args) {
        System.out.println(greet("world"));
    }
}
"#
        }
        Flavor::Api => {
            r#"package app;

import com.sun.net.httpserver.HttpServer;
import java.io.OutputStream;
import java.net.InetSocketAddress;

public class App {
    public static String health() {
        return "{\"status\":\"ok\"}";
    }

    public static void main(String[] args) throws Exception {
        HttpServer server = HttpServer.create(new InetSocketAddress(8080), 0);
        server.createContext("/health", exchange -> {
            byte[] body = health().getBytes();
            exchange.getResponseHeaders().add("Content-Type", "application/json");
            exchange.sendResponseHeaders(200, body.length);
            try (OutputStream out = exchange.getResponseBody()) {
                out.write(body);
            }
        });
        server.start();
    }
}
"#
        }
    };
    let test = match flavor {
        Flavor::Basic => {
            r#"package app;

import static org.junit.jupiter.api.Assertions.assertEquals;

import org.junit.jupiter.api.Test;

class AppTest {
    @Test
    void greets() {
        assertEquals("Hello, world!", App.greet("world"));
    }
}
"#
        }
        Flavor::Api => {
            r#"package app;

import static org.junit.jupiter.api.Assertions.assertEquals;

import org.junit.jupiter.api.Test;

class AppTest {
    @Test
    void healthIsOk() {
        assertEquals("{\"status\":\"ok\"}", App.health());
    }
}
"#
        }
    };
    vec![
        GeneratedFile::new(
            "pom.xml",
            r#"<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>app</groupId>
  <artifactId>app</artifactId>
  <version>0.1.0</version>
  <properties>
    <maven.compiler.release>17</maven.compiler.release>
  </properties>
  <dependencies>
    <dependency>
      <groupId>org.junit.jupiter</groupId>
      <artifactId>junit-jupiter</artifactId>
      <version>5.10.2</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
  <build>
    <plugins>
      <plugin>
        <groupId>org.apache.maven.plugins</groupId>
        <artifactId>maven-surefire-plugin</artifactId>
        <version>3.2.5</version>
      </plugin>
    </plugins>
  </build>
</project>
"#,
        ),
        GeneratedFile::new("src/main/java/app/App.java", main),
        GeneratedFile::new("src/test/java/app/AppTest.java", test),
    ]
}

fn go_basic() -> Vec<GeneratedFile> {
    vec![
        GeneratedFile::new("go.mod", "module app\n\ngo 1.21\n"),
        GeneratedFile::new(
            "main.go",
            r#"package main

import "fmt"

func Greet(name string) string {
	return fmt.Sprintf("Hello, %s!", name)
}

func main() {
	fmt.Println(Greet("world"))
}
"#,
        ),
        GeneratedFile::new(
            "main_test.go",
            r#"package main

import "testing"

func TestGreet(t *testing.T) {
	if got := Greet("world"); got != "Hello, world!" {
		t.Fatalf("unexpected greeting %q", got)
	}
}
"#,
        ),
    ]
}

fn go_api() -> Vec<GeneratedFile> {
    vec![
        GeneratedFile::new("go.mod", "module app\n\ngo 1.21\n"),
        GeneratedFile::new(
            "main.go",
            r#"package main

import (
	"encoding/json"
	"log"
	"net/http"
)

func healthHandler(w http.ResponseWriter, r *http.Request) {
	w.Header().Set("Content-Type", "application/json")
	_ = json.NewEncoder(w).Encode(map[string]string{"status": "ok"})
}

func main() {
	http.HandleFunc("/health", healthHandler)
	log.Fatal(http.ListenAndServe(":8080", nil))
}
"#,
        ),
        GeneratedFile::new(
            "main_test.go",
            r#"package main

import (
	"net/http"
	"net/http/httptest"
	"testing"
)

func TestHealth(t *testing.T) {
	rec := httptest.NewRecorder()
	healthHandler(rec, httptest.NewRequest(http.MethodGet, "/health", nil))
	if rec.Code != http.StatusOK {
		t.Fatalf("unexpected status %d", rec.Code)
	}
}
"#,
        ),
    ]
}

fn rust(flavor: Flavor) -> Vec<GeneratedFile> {
    let main = match flavor {
        Flavor::Basic => {
            r#"fn greet(name: &str) -> String {
    format!("Hello, {name}!")
}

fn main() {
    println!("{}", greet("world"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greets() {
        assert_eq!(greet("world"), "Hello, world!");
    }
}
"#
        }
        Flavor::Api => {
            r##"use std::io::{Read, Write};
use std::net::TcpListener;

fn health_body() -> &'static str {
    r#"{"status":"ok"}"#
}

fn respond(request: &str) -> String {
    if request.starts_with("GET /health ") {
        let body = health_body();
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_string()
    }
}

fn main() -> std::io::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:8080")?;
    for stream in listener.incoming() {
        let mut stream = stream?;
        let mut buf = [0u8; 1024];
        let n = stream.read(&mut buf)?;
        let request = String::from_utf8_lossy(&buf[..n]);
        stream.write_all(respond(&request).as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_returns_ok() {
        assert!(respond("GET /health HTTP/1.1\r\n\r\n").starts_with("HTTP/1.1 200"));
    }
}
"##
        }
    };
    vec![
        GeneratedFile::new(
            "Cargo.toml",
            "[package]\nname = \"app\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n[dependencies]\n",
        ),
        GeneratedFile::new("src/main.rs", main),
    ]
}

fn php(flavor: Flavor) -> Vec<GeneratedFile> {
    let index = match flavor {
        Flavor::Basic => {
            r#"<?php

function greet(string $name): string
{
    return "Hello, {$name}!";
}

echo greet("world") . PHP_EOL;
"#
        }
        Flavor::Api => {
            r#"<?php

header('Content-Type: application/json');

if (parse_url($_SERVER['REQUEST_URI'] ?? '/', PHP_URL_PATH) === '/health') {
    echo json_encode(['status' => 'ok']);
} else {
    http_response_code(404);
}
"#
        }
    };
    vec![
        GeneratedFile::new(
            "composer.json",
            r#"{
  "name": "app/app",
  "require": {
    "php": ">=8.1"
  }
}
"#,
        ),
        GeneratedFile::new("index.php", index),
    ]
}

fn ruby(flavor: Flavor) -> Vec<GeneratedFile> {
    let app = match flavor {
        Flavor::Basic => {
            r#"def greet(name)
  "Hello, #{name}!"
end

puts greet("world") if __FILE__ == $PROGRAM_NAME
"#
        }
        Flavor::Api => {
            r#"require "json"
require "webrick"

def health
  { status: "ok" }
end

if __FILE__ == $PROGRAM_NAME
  server = WEBrick::HTTPServer.new(Port: 4567)
  server.mount_proc("/health") do |_req, res|
    res["Content-Type"] = "application/json"
    res.body = health.to_json
  end
  trap("INT") { server.shutdown }
  server.start
end
"#
        }
    };
    let test = match flavor {
        Flavor::Basic => {
            r#"require "minitest/autorun"
require_relative "app"

class AppTest < Minitest::Test
  def test_greet
    assert_equal "Hello, world!", greet("world")
  end
end
"#
        }
        Flavor::Api => {
            r#"require "minitest/autorun"
require_relative "app"

class AppTest < Minitest::Test
  def test_health
    assert_equal({ status: "ok" }, health)
  end
end
"#
        }
    };
    vec![
        GeneratedFile::new("Gemfile", "source \"https://rubygems.org\"\n\ngem \"minitest\"\n"),
        GeneratedFile::new("app.rb", app),
        GeneratedFile::new("test/app_test.rb", test),
    ]
}
